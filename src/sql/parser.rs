use super::statement::Statement;
use super::validator;
use crate::errors::Error;
use crate::storage::row::{Row, COLUMN_EMAIL_SIZE, COLUMN_USERNAME_SIZE};

/// Turns one input line into an executable [`Statement`].
///
/// Statement keywords are recognized by prefix, so an `insert` with
/// malformed arguments is a syntax error rather than an unrecognized
/// keyword.
///
/// # Errors
/// Every failure is a reported error carrying its exact shell message:
/// `SyntaxError`, `NegativeId`, `StringTooLong`, or
/// `UnrecognizedStatement`.
pub fn prepare(input: &str) -> Result<Statement, Error> {
    if input.starts_with("insert") {
        return prepare_insert(input);
    }
    if input.starts_with("select") {
        return Ok(Statement::Select);
    }
    Err(Error::UnrecognizedStatement(input.to_string()))
}

fn prepare_insert(input: &str) -> Result<Statement, Error> {
    let parts: Vec<&str> = input.split_whitespace().collect();
    if parts.len() != 4 {
        return Err(Error::SyntaxError);
    }
    let (id_token, username, email) = (parts[1], parts[2], parts[3]);

    if !validator::is_id_literal(id_token) {
        return Err(Error::SyntaxError);
    }
    // Negativity is judged on the parsed value, not the sign character,
    // so "-0" is the non-negative id 0 and a leading "+" is accepted.
    let id: i128 = id_token.parse().map_err(|_| Error::SyntaxError)?;
    if id < 0 {
        return Err(Error::NegativeId);
    }
    let id = u32::try_from(id).map_err(|_| Error::SyntaxError)?;

    if username.len() > COLUMN_USERNAME_SIZE || email.len() > COLUMN_EMAIL_SIZE {
        return Err(Error::StringTooLong);
    }

    Ok(Statement::Insert(Row::new(id, username, email)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepares_insert() {
        let statement = prepare("insert 1 user1 person1@example.com").unwrap();
        match statement {
            Statement::Insert(row) => {
                assert_eq!(row.id, 1);
                assert_eq!(row.username(), "user1");
                assert_eq!(row.email(), "person1@example.com");
            }
            other => panic!("expected insert, got {:?}", other),
        }
    }

    #[test]
    fn prepares_select_by_prefix() {
        assert!(matches!(prepare("select").unwrap(), Statement::Select));
        assert!(matches!(prepare("select *").unwrap(), Statement::Select));
    }

    #[test]
    fn zero_id_is_accepted() {
        assert!(prepare("insert 0 a b").is_ok());
    }

    #[test]
    fn signed_zero_and_plus_prefix_parse_by_value() {
        match prepare("insert -0 a b").unwrap() {
            Statement::Insert(row) => assert_eq!(row.id, 0),
            other => panic!("expected insert, got {:?}", other),
        }
        match prepare("insert +5 a b").unwrap() {
            Statement::Insert(row) => assert_eq!(row.id, 5),
            other => panic!("expected insert, got {:?}", other),
        }
    }

    #[test]
    fn wrong_arity_is_a_syntax_error() {
        assert!(matches!(prepare("insert"), Err(Error::SyntaxError)));
        assert!(matches!(prepare("insert 1 a"), Err(Error::SyntaxError)));
        assert!(matches!(prepare("insert 1 a b c"), Err(Error::SyntaxError)));
    }

    #[test]
    fn non_numeric_id_is_a_syntax_error() {
        assert!(matches!(prepare("insert abc a b"), Err(Error::SyntaxError)));
    }

    #[test]
    fn id_past_u32_range_is_a_syntax_error() {
        assert!(matches!(
            prepare("insert 4294967296 a b"),
            Err(Error::SyntaxError)
        ));
        assert!(prepare("insert 4294967295 a b").is_ok());
    }

    #[test]
    fn negative_id_is_reported() {
        assert!(matches!(
            prepare("insert -7 foo bar@x"),
            Err(Error::NegativeId)
        ));
        // Still negative once parsed, even though it would overflow u32.
        assert!(matches!(
            prepare("insert -4294967296 a b"),
            Err(Error::NegativeId)
        ));
    }

    #[test]
    fn oversized_strings_are_reported() {
        let long_username = "a".repeat(COLUMN_USERNAME_SIZE + 1);
        let long_email = "a".repeat(COLUMN_EMAIL_SIZE + 1);
        assert!(matches!(
            prepare(&format!("insert 1 {} ok@example.com", long_username)),
            Err(Error::StringTooLong)
        ));
        assert!(matches!(
            prepare(&format!("insert 1 ok {}", long_email)),
            Err(Error::StringTooLong)
        ));

        // Exactly at the limits is fine.
        let max_username = "a".repeat(COLUMN_USERNAME_SIZE);
        let max_email = "a".repeat(COLUMN_EMAIL_SIZE);
        assert!(prepare(&format!("insert 1 {} {}", max_username, max_email)).is_ok());
    }

    #[test]
    fn unknown_keyword_is_reported_with_input() {
        let err = prepare("update foo").unwrap_err();
        assert!(matches!(err, Error::UnrecognizedStatement(_)));
        assert_eq!(
            err.to_string(),
            "Unrecognized keyword at start of 'update foo'."
        );
    }
}
