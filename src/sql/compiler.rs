//! SQL compilation of view reads and planned writes.
//!
//! Statements are assembled as a [`TokenStream`] and serialized once. Values
//! never appear in the text: every operand becomes a `:bN` marker with a
//! [`Bind`] in marker order, and markers are rewritten to the dialect's
//! placeholders only when the statement is executed.
//!
//! Property paths resolve through [`ViewDef::ref_path`]: the explicit
//! mapping target when one exists, else the snake_case default column. The
//! result is a raw SQL expression, so mappings may name qualified columns or
//! computed expressions.

use std::collections::BTreeMap;

use uuid::Uuid;

use super::dialect::{Dialect, SqlDialect};
use super::params;
use super::statement::{ExecKind, SqlStatement};
use super::token::{Token, TokenStream};
use crate::authoring::{EntityAuthoring, TypeRef, ViewDef};
use crate::bind::element_type_id;
use crate::compile::PropertyTypeResolver;
use crate::dialect::NativeDialect;
use crate::dml::{Bind, DeleteAst, DmlAst, InsertAst, UpdateAst, UpsertAst};
use crate::error::{Error, PathUsage, PlanningError, ValidationError};
use crate::query::json_path::{json_fragment, json_path_segments};
use crate::query::{Clause, Condition, Operator, Page, QueryElement, SortDir, SortField};
use crate::value::Value;

const COUNT_ALIAS: &str = "strata_count";
const BASE_ALIAS: &str = "strata_base";

/// Compiles reads and writes for one SQL [`Dialect`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlCompiler {
    dialect: Dialect,
}

impl SqlCompiler {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Base query of a view, the binds its text needs, and whether the
    /// outermost statement already has a WHERE clause.
    fn base_select(
        &self,
        ea: &EntityAuthoring,
        view: &ViewDef,
        params: &BTreeMap<String, Value>,
    ) -> Result<(TokenStream, Vec<Bind>, bool), Error> {
        match &view.native {
            Some(native) => {
                let base_sql = native
                    .sql_text()
                    .filter(|s| !s.trim().is_empty())
                    .ok_or_else(|| {
                        PlanningError::InvalidNativeQuery(
                            view.id.clone(),
                            "sql must be non-blank SQL text".into(),
                        )
                    })?;
                let projection = native.projection_text().unwrap_or("*");
                let lower = base_sql.trim().to_ascii_lowercase();
                let full_query = lower.starts_with("select") || lower.starts_with("with");

                let (sql, has_where) = if full_query && projection == "*" {
                    (base_sql.to_string(), mentions_where(&lower))
                } else if full_query {
                    (format!("SELECT {projection} FROM ({base_sql}) {BASE_ALIAS}"), false)
                } else {
                    (format!("SELECT {projection} {base_sql}"), mentions_where(&lower))
                };
                let binds = params::binds_for(&sql, params)?;
                Ok((TokenStream::from(Token::Raw(sql)), binds, has_where))
            }
            None => Ok((self.derived_select(ea, view)?, Vec::new(), false)),
        }
    }

    /// `SELECT <mapped columns> FROM "source"` for views without native SQL.
    fn derived_select(&self, ea: &EntityAuthoring, view: &ViewDef) -> Result<TokenStream, Error> {
        let source = ea
            .source()
            .ok_or_else(|| PlanningError::NoSource(ea.type_name.clone()))?;

        let mut items = Vec::new();
        for (name, def) in &ea.fields {
            if let TypeRef::Ref(_) = def.ty {
                // Reference fields are selected only through nested mappings.
                let Some(children) = view.mapping.get(name).and_then(|m| m.nested_fields()) else {
                    continue;
                };
                for (child, spec) in children {
                    if let Some(col) = spec.target() {
                        items.push(select_item(col, &format!("{name}.{child}")));
                    }
                }
                continue;
            }
            items.push(select_item(&view.ref_path(name), name));
        }
        if items.is_empty() {
            items.push(Token::Star.into());
        }

        let mut ts = TokenStream::new();
        ts.push(Token::Select).space();
        ts.comma_separated(items);
        ts.space()
            .push(Token::From)
            .space()
            .push(Token::Ident(source.to_string()));
        Ok(ts)
    }

    fn render_insert(&self, ins: &InsertAst, with_returning: bool) -> Result<(TokenStream, Vec<Bind>), Error> {
        if ins.columns.is_empty() {
            return Err(PlanningError::EmptyInsert(ins.table.clone()).into());
        }
        let mut binds = Vec::with_capacity(ins.columns.len());
        let mut markers = Vec::with_capacity(ins.columns.len());
        for cb in &ins.columns {
            binds.push(cb.bind.clone());
            markers.push(TokenStream::from(marker(binds.len())));
        }

        let mut columns = TokenStream::new();
        columns.comma_separated(ins.columns.iter().map(|cb| Token::Ident(cb.column.clone()).into()));
        let mut values = TokenStream::new();
        values.comma_separated(markers);

        let mut ts = TokenStream::new();
        ts.push(Token::Insert)
            .space()
            .push(Token::Into)
            .space()
            .push(Token::Ident(ins.table.clone()))
            .space()
            .append(&columns.parenthesized())
            .space()
            .push(Token::Values)
            .space()
            .append(&values.parenthesized());

        if with_returning {
            let returning = self.dialect.insert_returning(&ins.returning);
            if !returning.is_empty() {
                ts.space().append(&returning);
            }
        }
        Ok((ts, binds))
    }

    fn render_update(
        &self,
        ea: &EntityAuthoring,
        view: &ViewDef,
        upd: &UpdateAst,
        types: &PropertyTypeResolver,
    ) -> Result<SqlStatement, Error> {
        if upd.sets.is_empty() {
            return Err(PlanningError::EmptyUpdate(upd.table.clone()).into());
        }
        let mut r = Render::new(self.dialect, ea, view, types);
        let sets: Vec<TokenStream> = upd
            .sets
            .iter()
            .map(|cb| {
                let mut set = TokenStream::new();
                set.push(Token::Ident(cb.column.clone()))
                    .space()
                    .push(Token::Eq)
                    .space()
                    .push(r.push_bind(cb.bind.clone()));
                set
            })
            .collect();

        let mut ts = TokenStream::new();
        ts.push(Token::Update)
            .space()
            .push(Token::Ident(upd.table.clone()))
            .space()
            .push(Token::Set)
            .space();
        ts.comma_separated(sets);
        r.append_where(&mut ts, upd.filter.as_ref())?;
        Ok(SqlStatement::new(ts.serialize(self.dialect), r.binds, ExecKind::Update))
    }

    fn render_delete(
        &self,
        ea: &EntityAuthoring,
        view: &ViewDef,
        del: &DeleteAst,
        types: &PropertyTypeResolver,
    ) -> Result<SqlStatement, Error> {
        let mut r = Render::new(self.dialect, ea, view, types);
        let mut ts = TokenStream::new();
        ts.push(Token::Delete)
            .space()
            .push(Token::From)
            .space()
            .push(Token::Ident(del.table.clone()));
        r.append_where(&mut ts, del.filter.as_ref())?;
        Ok(SqlStatement::new(ts.serialize(self.dialect), r.binds, ExecKind::Update))
    }

    fn render_upsert(&self, ups: &UpsertAst) -> Result<SqlStatement, Error> {
        let (insert, binds) = self.render_insert(&ups.insert, false)?;
        let (ts, exec) = self.dialect.render_upsert(insert, ups)?;
        Ok(SqlStatement::new(ts.serialize(self.dialect), binds, exec))
    }
}

impl NativeDialect for SqlCompiler {
    type Statement = SqlStatement;

    fn id(&self) -> &str {
        self.dialect.name()
    }

    fn merge_select(
        &self,
        ea: &EntityAuthoring,
        view: &ViewDef,
        filter: Option<&QueryElement>,
        sort: &[SortField],
        page: &Page,
        params: &BTreeMap<String, Value>,
        types: &PropertyTypeResolver,
    ) -> Result<SqlStatement, Error> {
        let (mut ts, mut binds, mut has_where) = self.base_select(ea, view, params)?;
        let mut r = Render::new(self.dialect, ea, view, types);

        if let Some(pred) = filter.map(|f| r.predicate(f, false, true)).transpose()?.flatten() {
            push_predicate(&mut ts, &mut has_where, pred);
        }
        if let Page::Seek { after, .. } = page {
            if let Some((pred, terms)) = r.seek(sort, after)? {
                // OR-of-terms must not absorb an earlier AND.
                let pred = if has_where && terms > 1 { pred.parenthesized() } else { pred };
                push_predicate(&mut ts, &mut has_where, pred);
            }
        }
        if !sort.is_empty() {
            ts.space().push(Token::OrderBy).space();
            ts.comma_separated(sort.iter().map(|sf| {
                let mut item = TokenStream::new();
                item.push(Token::Raw(view.ref_path(&sf.field))).space().push(match sf.dir {
                    SortDir::Asc => Token::Asc,
                    SortDir::Desc => Token::Desc,
                });
                item
            }));
        }
        let page_clause = self.dialect.emit_page(page);
        if !page_clause.is_empty() {
            ts.space().append(&page_clause);
        }

        binds.append(&mut r.binds);
        Ok(SqlStatement::query(ts.serialize(self.dialect), binds))
    }

    fn merge_count(
        &self,
        ea: &EntityAuthoring,
        view: &ViewDef,
        filter: Option<&QueryElement>,
        params: &BTreeMap<String, Value>,
        types: &PropertyTypeResolver,
    ) -> Result<SqlStatement, Error> {
        let (mut inner, mut binds, mut has_where) = self.base_select(ea, view, params)?;
        let mut r = Render::new(self.dialect, ea, view, types);
        if let Some(pred) = filter.map(|f| r.predicate(f, false, true)).transpose()?.flatten() {
            push_predicate(&mut inner, &mut has_where, pred);
        }

        let mut ts = TokenStream::new();
        ts.push(Token::Select)
            .space()
            .push(Token::Raw("COUNT(1)".into()))
            .space()
            .push(Token::From)
            .space()
            .append(&inner.parenthesized())
            .space()
            .push(Token::Raw(COUNT_ALIAS.into()));

        binds.append(&mut r.binds);
        Ok(SqlStatement::query(ts.serialize(self.dialect), binds))
    }

    fn render_dml(
        &self,
        ea: &EntityAuthoring,
        view: &ViewDef,
        ast: &DmlAst,
        types: &PropertyTypeResolver,
    ) -> Result<SqlStatement, Error> {
        match ast {
            DmlAst::Insert(ins) => {
                let (ts, binds) = self.render_insert(ins, true)?;
                let exec = self.dialect.insert_exec_kind(!ins.returning.is_empty());
                Ok(SqlStatement::new(ts.serialize(self.dialect), binds, exec))
            }
            DmlAst::Update(upd) => self.render_update(ea, view, upd, types),
            DmlAst::Delete(del) => self.render_delete(ea, view, del, types),
            DmlAst::Upsert(ups) => self.render_upsert(ups),
        }
    }
}

/// Predicate rendering state: markers are numbered across every predicate
/// of one statement.
struct Render<'a> {
    dialect: Dialect,
    ea: &'a EntityAuthoring,
    view: &'a ViewDef,
    types: &'a PropertyTypeResolver,
    binds: Vec<Bind>,
}

impl<'a> Render<'a> {
    fn new(
        dialect: Dialect,
        ea: &'a EntityAuthoring,
        view: &'a ViewDef,
        types: &'a PropertyTypeResolver,
    ) -> Self {
        Self {
            dialect,
            ea,
            view,
            types,
            binds: Vec::new(),
        }
    }

    fn push_bind(&mut self, bind: Bind) -> Token {
        self.binds.push(bind);
        marker(self.binds.len())
    }

    fn bind_value(&mut self, value: &Value, type_id: &str) -> Token {
        self.push_bind(Bind::new(coerce_scalar(type_id, value.clone()), type_id))
    }

    /// ` WHERE <predicate>` for writes; the outermost group is not wrapped.
    fn append_where(&mut self, ts: &mut TokenStream, filter: Option<&QueryElement>) -> Result<(), Error> {
        if let Some(pred) = filter.map(|f| self.predicate(f, false, false)).transpose()?.flatten() {
            ts.space().push(Token::Where).space().append(&pred);
        }
        Ok(())
    }

    /// Render `el`, pushing negation down to the leaves. `None` when the
    /// element is an empty group.
    fn predicate(&mut self, el: &QueryElement, negate: bool, wrap: bool) -> Result<Option<TokenStream>, Error> {
        match el {
            QueryElement::Not(child) => self.predicate(child, !negate, wrap),
            QueryElement::Condition(c) => self.condition(c, negate).map(Some),
            QueryElement::Group { clause, elements } => {
                let clause = if negate { clause.flip() } else { *clause };
                let child_wrap = wrap || elements.len() > 1;
                let mut parts = Vec::with_capacity(elements.len());
                for child in elements {
                    if let Some(part) = self.predicate(child, negate, child_wrap)? {
                        parts.push(part);
                    }
                }
                if parts.len() <= 1 {
                    return Ok(parts.pop());
                }
                let joined = join(parts, clause);
                Ok(Some(if wrap { joined.parenthesized() } else { joined }))
            }
        }
    }

    fn condition(&mut self, c: &Condition, negate: bool) -> Result<TokenStream, Error> {
        let expr = self.view.ref_path(&c.property);
        let type_id = self.scalar_type(&c.property, PathUsage::Filter)?;
        let not = c.not ^ negate;
        let op = c.operator;

        let (ts, not) = match op {
            Operator::Eq | Operator::Ne if c.value.is_null() => {
                let check = if op == Operator::Eq { Token::IsNull } else { Token::IsNotNull };
                let mut ts = TokenStream::from(Token::Raw(expr));
                ts.space().push(check);
                (ts, not)
            }
            Operator::Eq => (self.compare(&expr, Token::Eq, &c.value, &type_id), not),
            Operator::Ne => (self.compare(&expr, Token::Ne, &c.value, &type_id), not),
            Operator::Gt | Operator::Ge | Operator::Lt | Operator::Le | Operator::Like => {
                if c.value.is_null() {
                    return Err(PlanningError::NullOperand(op.name().into()).into());
                }
                let token = match op {
                    Operator::Gt => Token::Gt,
                    Operator::Ge => Token::Gte,
                    Operator::Lt => Token::Lt,
                    Operator::Le => Token::Lte,
                    _ => Token::Like,
                };
                (self.compare(&expr, token, &c.value, &type_id), not)
            }
            Operator::In | Operator::Nin => {
                let values = c.value.to_list();
                if values.is_empty() {
                    // IN () matches nothing; NOT IN () matches everything.
                    return Ok(Token::LitBool((op == Operator::Nin) ^ not).into());
                }
                if values.iter().any(Value::is_null) {
                    return Err(PlanningError::NullOperand(op.name().into()).into());
                }
                let markers: Vec<TokenStream> = values
                    .iter()
                    .map(|v| self.bind_value(v, &type_id).into())
                    .collect();
                let mut list = TokenStream::new();
                list.comma_separated(markers);

                let mut ts = TokenStream::from(Token::Raw(expr));
                ts.space();
                if op == Operator::Nin {
                    ts.push(Token::Not).space();
                }
                ts.push(Token::In).space().append(&list.parenthesized());
                (ts, not)
            }
            Operator::Range => {
                if c.lower.is_null() || c.upper.is_null() {
                    return Err(PlanningError::NullOperand(op.name().into()).into());
                }
                let lo = self.bind_value(&c.lower, &type_id);
                let hi = self.bind_value(&c.upper, &type_id);
                let mut ts = TokenStream::from(Token::Raw(expr));
                ts.space()
                    .push(Token::Between)
                    .space()
                    .push(lo)
                    .space()
                    .push(Token::And)
                    .space()
                    .push(hi);
                (ts, not)
            }
            Operator::ArrayContains | Operator::ArrayNotContains => {
                let eff_not = not ^ (op == Operator::ArrayNotContains);
                let values = c.value.to_list();
                if values.is_empty() {
                    // Every array contains the empty set.
                    return Ok(Token::LitBool(!eff_not).into());
                }
                let marker = self.bind_list(values, &type_id);
                (self.dialect.array_contains(&expr, marker)?, eff_not)
            }
            Operator::ArrayOverlaps | Operator::ArrayNotOverlaps => {
                let eff_not = not ^ (op == Operator::ArrayNotOverlaps);
                let values = c.value.to_list();
                if values.is_empty() {
                    return Ok(Token::LitBool(eff_not).into());
                }
                let marker = self.bind_list(values, &type_id);
                (self.dialect.array_overlaps(&expr, marker)?, eff_not)
            }
            Operator::JsonPathExists => {
                let path = c.value.as_str().ok_or(PlanningError::InvalidOperand {
                    op,
                    expected: "a JSON path string",
                })?;
                let segments = json_path_segments(path);
                (self.dialect.json_path_exists(&expr, &segments)?, not)
            }
            Operator::JsonValueEq => {
                let (path, value) = c
                    .value
                    .as_map()
                    .and_then(|m| Some((m.get("path")?.as_str()?, m.get("value").cloned().unwrap_or(Value::Null))))
                    .ok_or(PlanningError::InvalidOperand {
                        op,
                        expected: "an object with path and value",
                    })?;
                let fragment = json_fragment(&json_path_segments(path), value);
                let marker = self.push_bind(Bind::new(fragment, "json"));
                (self.dialect.json_value_eq(&expr, marker)?, not)
            }
        };
        Ok(if not { negated(ts) } else { ts })
    }

    fn compare(&mut self, expr: &str, op: Token, value: &Value, type_id: &str) -> TokenStream {
        let marker = self.bind_value(value, type_id);
        let mut ts = TokenStream::from(Token::Raw(expr.to_string()));
        ts.space().push(op).space().push(marker);
        ts
    }

    /// One marker binding the whole list with the field's container type.
    fn bind_list(&mut self, values: Vec<Value>, type_id: &str) -> Token {
        let items = match element_type_id(type_id) {
            Some(elem) => values.into_iter().map(|v| coerce_scalar(elem, v)).collect(),
            None => values,
        };
        self.push_bind(Bind::new(Value::List(items), type_id))
    }

    /// Keyset predicate and its number of OR terms; `None` on the first page.
    fn seek(
        &mut self,
        sort: &[SortField],
        after: &BTreeMap<String, Value>,
    ) -> Result<Option<(TokenStream, usize)>, Error> {
        if after.is_empty() {
            return Ok(None);
        }
        if sort.is_empty() {
            return Err(PlanningError::SeekWithoutSort.into());
        }

        let mut terms = Vec::with_capacity(sort.len());
        for i in 0..sort.len() {
            let mut parts = Vec::with_capacity(i + 1);
            for (j, sf) in sort[..=i].iter().enumerate() {
                let value = after
                    .get(&sf.field)
                    .filter(|v| !v.is_null())
                    .ok_or_else(|| PlanningError::MissingSeekValue(sf.field.clone()))?;
                let type_id = self.scalar_type(&sf.field, PathUsage::Sort)?;
                let op = match (j < i, sf.dir) {
                    (true, _) => Token::Eq,
                    (false, SortDir::Asc) => Token::Gt,
                    (false, SortDir::Desc) => Token::Lt,
                };
                let expr = self.view.ref_path(&sf.field);
                parts.push(self.compare(&expr, op, value, &type_id));
            }
            terms.push(join(parts, Clause::And).parenthesized());
        }
        let count = terms.len();
        Ok(Some((join(terms, Clause::Or), count)))
    }

    fn scalar_type(&self, path: &str, usage: PathUsage) -> Result<String, ValidationError> {
        self.types
            .resolve_scalar_type_id(self.ea, path)
            .ok_or_else(|| ValidationError::UnknownPath {
                path: path.to_string(),
                usage,
                entity: self.ea.type_name.clone(),
            })
    }
}

fn marker(n: usize) -> Token {
    Token::Marker(format!("b{n}"))
}

fn select_item(expr: &str, alias: &str) -> TokenStream {
    let mut ts = TokenStream::new();
    ts.push(Token::Raw(expr.to_string()))
        .space()
        .push(Token::As)
        .space()
        .push(Token::Ident(alias.to_string()));
    ts
}

fn join(parts: Vec<TokenStream>, clause: Clause) -> TokenStream {
    let keyword = match clause {
        Clause::And => Token::And,
        Clause::Or => Token::Or,
    };
    let mut ts = TokenStream::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            ts.space().push(keyword.clone()).space();
        }
        ts.append(part);
    }
    ts
}

fn negated(ts: TokenStream) -> TokenStream {
    let mut out = TokenStream::from(Token::Not);
    out.space().append(&ts.parenthesized());
    out
}

fn mentions_where(lower_sql: &str) -> bool {
    lower_sql.split_whitespace().any(|word| word == "where")
}

fn push_predicate(ts: &mut TokenStream, has_where: &mut bool, pred: TokenStream) {
    ts.space()
        .push(if *has_where { Token::And } else { Token::Where })
        .space()
        .append(&pred);
    *has_where = true;
}

/// `uuid`-typed values given as text bind as UUIDs.
fn coerce_scalar(type_id: &str, value: Value) -> Value {
    match value {
        Value::String(s) if type_id.eq_ignore_ascii_case("uuid") => match Uuid::parse_str(s.trim()) {
            Ok(u) => Value::Uuid(u),
            Err(_) => Value::String(s),
        },
        other => other,
    }
}
