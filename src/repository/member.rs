use crate::core::{DbError, Result, Row, Value};
use serde::{Deserialize, Serialize};

/// An account: a unique id and its balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub member_id: String,
    pub money: i64,
}

impl Member {
    pub fn new(member_id: impl Into<String>, money: i64) -> Self {
        Self {
            member_id: member_id.into(),
            money,
        }
    }

    /// Maps a `(member_id, money)` row.
    pub fn from_row(row: &Row) -> Result<Self> {
        match row.as_slice() {
            [Value::Text(member_id), Value::Integer(money)] => Ok(Self {
                member_id: member_id.clone(),
                money: *money,
            }),
            other => Err(DbError::TypeMismatch(format!(
                "expected (member_id TEXT, money INTEGER), got {:?}",
                other
            ))),
        }
    }

    pub(crate) fn params(&self) -> [Value; 2] {
        [Value::from(self.member_id.as_str()), Value::Integer(self.money)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_row() {
        let row = vec![Value::from("memberA"), Value::Integer(10_000)];
        assert_eq!(Member::from_row(&row).unwrap(), Member::new("memberA", 10_000));
    }

    #[test]
    fn test_from_row_rejects_wrong_shape() {
        assert!(Member::from_row(&vec![Value::from("memberA")]).is_err());
        assert!(Member::from_row(&vec![Value::from("memberA"), Value::Null]).is_err());
        assert!(Member::from_row(&vec![Value::Integer(1), Value::Integer(2)]).is_err());
    }

    #[test]
    fn test_json_shape() {
        let json = serde_json::to_value(Member::new("memberB", 5)).unwrap();
        assert_eq!(json, serde_json::json!({"member_id": "memberB", "money": 5}));
    }
}
