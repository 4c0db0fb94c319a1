// harvest-core/src/domain/sql/quoter.rs
use sqlparser::ast::Ident;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::{Parser, ParserError};

pub struct UniversalQuoter;

impl UniversalQuoter {
    /// Quotes an identifier ("field_name"), doubling embedded quotes.
    pub fn quote_ident(name: &str) -> String {
        Ident::with_quote('"', name).to_string()
    }

    /// `CREATE TABLE "t" ("a" TEXT, ...);`
    pub fn create_table<'c>(table: &str, columns: impl IntoIterator<Item = (&'c str, &'c str)>) -> String {
        let defs: Vec<String> = columns
            .into_iter()
            .map(|(name, sql_type)| format!("{} {sql_type}", Self::quote_ident(name)))
            .collect();
        format!(
            "CREATE TABLE {} ({});",
            Self::quote_ident(table),
            defs.join(", ")
        )
    }

    /// `ALTER TABLE "t" ADD COLUMN "c" REAL;`
    pub fn add_column(table: &str, column: &str, sql_type: &str) -> String {
        format!(
            "ALTER TABLE {} ADD COLUMN {} {sql_type};",
            Self::quote_ident(table),
            Self::quote_ident(column)
        )
    }

    /// `INSERT INTO "t" ("a", "b") VALUES (?, ?)`
    pub fn insert(table: &str, columns: &[String]) -> String {
        let names: Vec<String> = columns.iter().map(|c| Self::quote_ident(c)).collect();
        let params = vec!["?"; columns.len()].join(", ");
        format!(
            "INSERT INTO {} ({}) VALUES ({params})",
            Self::quote_ident(table),
            names.join(", ")
        )
    }

    /// Parses generated SQL back with the generic dialect before it is run.
    pub fn check(sql: &str) -> Result<(), ParserError> {
        let dialect = GenericDialect {};
        let statements = Parser::parse_sql(&dialect, sql)?;
        tracing::debug!(statements = statements.len(), "Generated SQL checked");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident_escapes() {
        assert_eq!(UniversalQuoter::quote_ident("points"), "\"points\"");
        assert_eq!(UniversalQuoter::quote_ident("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn test_generated_statements_parse() {
        let create = UniversalQuoter::create_table("select", [("from", "TEXT"), ("x y", "REAL")]);
        assert_eq!(create, r#"CREATE TABLE "select" ("from" TEXT, "x y" REAL);"#);
        UniversalQuoter::check(&create).unwrap();

        let alter = UniversalQuoter::add_column("t", "c", "REAL");
        UniversalQuoter::check(&alter).unwrap();

        let insert = UniversalQuoter::insert("t", &["a".into(), "b".into()]);
        assert_eq!(insert, r#"INSERT INTO "t" ("a", "b") VALUES (?, ?)"#);
        UniversalQuoter::check(&insert).unwrap();
    }

    #[test]
    fn test_check_rejects_garbage() {
        assert!(UniversalQuoter::check("CREATE TABLE (").is_err());
    }
}
