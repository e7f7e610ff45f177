//! Query and validation helpers shared by the resource modules.

use folio_http::FieldErrors;
use sqlx::{Executor, QueryBuilder, Sqlite};
use time::OffsetDateTime;
use validator::Validate;

/// Calendar year of the server clock, evaluated on every call
pub fn current_year() -> i32 {
    OffsetDateTime::now_utc().year()
}

/// Build an `ORDER BY` body from a comma separated `?ordering=` value.
///
/// `allowed` maps public field names to SQL expressions. Unknown fields are
/// dropped; when nothing usable remains `default` is parsed instead.
/// `tie_break` is always appended so pages are stable.
pub fn order_by(
    raw: Option<&str>,
    allowed: &[(&str, &str)],
    default: &str,
    tie_break: &str,
) -> String {
    let mut terms = ordering_terms(raw.unwrap_or_default(), allowed);
    if terms.is_empty() {
        terms = ordering_terms(default, allowed);
    }
    terms.push(tie_break.to_string());
    terms.join(", ")
}

fn ordering_terms(raw: &str, allowed: &[(&str, &str)]) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|field| !field.is_empty())
        .filter_map(|field| {
            let (name, direction) = match field.strip_prefix('-') {
                Some(name) => (name, "DESC"),
                None => (field, "ASC"),
            };
            allowed
                .iter()
                .find(|(public, _)| *public == name)
                .map(|(_, column)| format!("{column} {direction}"))
        })
        .collect()
}

/// Split a `?search=` value into terms; every term must match.
///
/// Terms are folded with ASCII rules only, the same folding SQLite's
/// `lower()` applies to the column side in [`push_search`].
pub fn search_terms(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|term| !term.is_empty())
        .map(str::to_ascii_lowercase)
        .collect()
}

/// Append one `AND (...)` group per term, matching any of `columns`
/// case-insensitively. The builder must already hold a `WHERE` clause.
pub fn push_search(qb: &mut QueryBuilder<'_, Sqlite>, columns: &[&str], terms: Vec<String>) {
    for term in terms {
        qb.push(" AND (");
        for (i, column) in columns.iter().enumerate() {
            if i > 0 {
                qb.push(" OR ");
            }
            qb.push(format!("instr(lower({column}), "));
            qb.push_bind(term.clone());
            qb.push(") > 0");
        }
        qb.push(")");
    }
}

/// Derived validation results as field-keyed messages
pub fn validation_errors(payload: &impl Validate) -> FieldErrors {
    payload.validate().err().map(FieldErrors::from).unwrap_or_default()
}

/// Required and non-blank text field check
pub fn require_text(errors: &mut FieldErrors, field: &str, value: Option<&str>, required: bool) {
    match value {
        None if required => errors.add(field, "This field is required."),
        Some(value) if value.trim().is_empty() => errors.add(field, "This field may not be blank."),
        _ => {}
    }
}

/// Delete one row of `table` by id; a missing row is `RowNotFound`
pub async fn delete_row<'e, E>(executor: E, table: &str, id: i64) -> sqlx::Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("DELETE FROM {table} WHERE id = ?");
    let result = sqlx::query(&sql).bind(id).execute(executor).await?;
    if result.rows_affected() == 0 {
        return Err(sqlx::Error::RowNotFound);
    }
    Ok(())
}

/// Whether `table` holds a row with this id
pub async fn row_exists<'e, E>(executor: E, table: &str, id: i64) -> sqlx::Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT EXISTS (SELECT 1 FROM {table} WHERE id = ?)");
    let found: i64 = sqlx::query_scalar(&sql)
        .bind(id)
        .fetch_one(executor)
        .await?;
    Ok(found != 0)
}
