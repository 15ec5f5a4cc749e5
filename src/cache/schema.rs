//! Diesel table definitions

/// Creates the quote table and its lookup index if they are missing
pub const CREATE_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS currency (
        id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
        quote_date TEXT NOT NULL,
        value REAL NOT NULL
    );
    CREATE INDEX IF NOT EXISTS currency_quote_date_idx ON currency (quote_date);
";

diesel::table! {
    currency (id) {
        id -> Integer,
        quote_date -> Text,
        value -> Double,
    }
}
