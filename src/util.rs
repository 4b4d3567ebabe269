use std::fmt::Display;
use std::str::FromStr;

use tokio_postgres::types::{FromSql, ToSql};
use tokio_postgres::Row;

use crate::errors::RepoError;

pub type SqlArg = Box<dyn ToSql + Send + Sync>;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SimpleQueryOperation {
    Select,
    SelectForUpdate,
    Delete,
}

/// Builds `SELECT`/`DELETE` statements filtered by column equality.
pub struct SimpleQueryBuilder {
    op: SimpleQueryOperation,
    table: String,
    additions: Vec<(String, SqlArg)>,
    ordering: Option<String>,
}

impl SimpleQueryBuilder {
    pub fn new<N: Into<String>>(op: SimpleQueryOperation, table: N) -> Self {
        Self {
            op,
            table: table.into(),
            additions: Default::default(),
            ordering: None,
        }
    }

    pub fn with_arg<K: Into<String>, V: ToSql + Send + Sync + 'static>(mut self, k: K, v: V) -> Self {
        self.additions.push((k.into(), Box::new(v)));
        self
    }

    pub fn with_ordering<S: Into<String>>(mut self, ordering: S) -> Self {
        self.ordering = Some(ordering.into());
        self
    }

    pub fn build(self) -> (String, Vec<SqlArg>) {
        let mut args = vec![];
        let mut query = format!(
            "{} {}",
            match self.op {
                SimpleQueryOperation::Select | SimpleQueryOperation::SelectForUpdate => "SELECT * FROM",
                SimpleQueryOperation::Delete => "DELETE FROM",
            },
            self.table
        );
        for (i, (col, arg)) in self.additions.into_iter().enumerate() {
            if i == 0 {
                query.push_str(" WHERE ");
            } else {
                query.push_str(" AND ");
            }
            query.push_str(&format!("{} = ${}", col, i + 1));
            args.push(arg);
        }
        match self.op {
            SimpleQueryOperation::Select => {
                if let Some(ordering) = self.ordering {
                    query.push_str(&format!(" ORDER BY {}", ordering));
                }
            }
            SimpleQueryOperation::SelectForUpdate => {
                if let Some(ordering) = self.ordering {
                    query.push_str(&format!(" ORDER BY {}", ordering));
                }
                query.push_str(" FOR UPDATE");
            }
            SimpleQueryOperation::Delete => {
                query.push_str(" RETURNING *");
            }
        }
        query.push(';');

        (query, args)
    }
}

/// Restricts a query to rows matching the non-empty fields of a mask.
pub trait Filter {
    fn into_query_builder(self, op: SimpleQueryOperation, table: &'static str) -> SimpleQueryBuilder;
}

/// Conversion of a result row into a model.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> Result<Self, RepoError>;
}

pub fn column<'a, T: FromSql<'a>>(row: &'a Row, name: &'static str) -> Result<T, RepoError> {
    row.try_get(name).map_err(|e| RepoError::Parse {
        column: name,
        reason: format!("{}", e),
    })
}

/// Reads a text column holding one of the string-backed enums.
pub fn parsed_column<T>(row: &Row, name: &'static str) -> Result<T, RepoError>
where
    T: FromStr,
    T::Err: Display,
{
    let raw: String = column(row, name)?;
    raw.parse().map_err(|e: T::Err| RepoError::Parse {
        column: name,
        reason: format!("{}", e),
    })
}

pub fn as_params(args: &[SqlArg]) -> Vec<&(dyn ToSql + Sync)> {
    args.iter().map(|v| &**v as &(dyn ToSql + Sync)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_numbers_placeholders_from_one() {
        let (query, args) = SimpleQueryBuilder::new(SimpleQueryOperation::Select, "orders")
            .with_arg("customer_id", 1i32)
            .with_arg("status", "pending".to_string())
            .with_ordering("created_at DESC")
            .build();

        assert_eq!(
            query,
            "SELECT * FROM orders WHERE customer_id = $1 AND status = $2 ORDER BY created_at DESC;"
        );
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn delete_returns_removed_rows() {
        let (query, args) = SimpleQueryBuilder::new(SimpleQueryOperation::Delete, "cart_lines")
            .with_arg("cart_id", 7i32)
            .build();

        assert_eq!(query, "DELETE FROM cart_lines WHERE cart_id = $1 RETURNING *;");
        assert_eq!(args.len(), 1);
    }

    #[test]
    fn lock_without_filter() {
        let (query, args) = SimpleQueryBuilder::new(SimpleQueryOperation::SelectForUpdate, "products")
            .with_ordering("id")
            .build();

        assert_eq!(query, "SELECT * FROM products ORDER BY id FOR UPDATE;");
        assert!(args.is_empty());
    }
}
