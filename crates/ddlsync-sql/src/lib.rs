//! GoogleSQL identifier helpers.
//!
//! Column names the DDL synthesizer writes go through [`Ident`]; table ids are
//! validated with [`is_valid_ident`] and split with [`TablePath`].

use std::fmt;

/// Maximum length of a GoogleSQL identifier.
pub const IDENT_MAX: usize = 128;

/// A GoogleSQL identifier wrapper.
///
/// Display writes the value quoted with backticks, escaping embedded
/// backticks with a backslash.
///
/// # Example
/// ```
/// use ddlsync_sql::Ident;
/// assert_eq!(format!("{}", Ident("name")), "`name`");
/// assert_eq!(format!("{}", Ident("we`ird")), r"`we\`ird`");
/// ```
pub struct Ident<T: AsRef<str>>(pub T);

impl<T: AsRef<str>> fmt::Display for Ident<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`")?;
        for c in self.0.as_ref().chars() {
            match c {
                '`' => write!(f, "\\`")?,
                '\\' => write!(f, "\\\\")?,
                c => write!(f, "{}", c)?,
            }
        }
        write!(f, "`")
    }
}

/// Quote a GoogleSQL identifier.
///
/// Always quotes, which keeps reserved words like `type`, `order` or `hash`
/// usable as column names.
pub fn quote_ident(name: &str) -> String {
    format!("{}", Ident(name))
}

/// Returns true if `name` is a valid unquoted GoogleSQL identifier:
/// a letter or underscore followed by up to 127 letters, digits or
/// underscores.
pub fn is_valid_ident(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !(first.is_ascii_alphabetic() || first == '_') {
        return false;
    }
    name.len() <= IDENT_MAX && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// A table id split into its named schema and table name.
///
/// Tables in the default schema have an empty `schema`, matching what
/// `INFORMATION_SCHEMA.TABLES.TABLE_SCHEMA` reports for them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TablePath<'a> {
    pub schema: &'a str,
    pub name: &'a str,
}

impl<'a> TablePath<'a> {
    /// Split a fully-qualified id like `analytics.events` at its last dot.
    pub fn parse(id: &'a str) -> Self {
        match id.rsplit_once('.') {
            Some((schema, name)) => Self { schema, name },
            None => Self { schema: "", name: id },
        }
    }
}

impl fmt::Display for TablePath<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.schema.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}.{}", self.schema, self.name)
        }
    }
}
