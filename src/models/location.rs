use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'locations' table: a county, optionally narrowed to a
/// constituency and ward.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Location {
    pub id: i64,
    pub county: String,
    pub constituency: Option<String>,
    pub ward: Option<String>,
}

fn validate_hierarchy(req: &CreateLocationRequest) -> Result<(), validator::ValidationError> {
    if req.ward.is_some() && req.constituency.is_none() {
        return Err(validator::ValidationError::new("ward_without_constituency"));
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = validate_hierarchy))]
pub struct CreateLocationRequest {
    #[validate(length(min = 2, max = 100))]
    pub county: String,
    #[validate(length(min = 2, max = 100))]
    pub constituency: Option<String>,
    #[validate(length(min = 2, max = 100))]
    pub ward: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ward_needs_a_constituency() {
        let req = CreateLocationRequest {
            county: "Mombasa".to_string(),
            constituency: None,
            ward: Some("Tudor".to_string()),
        };
        assert!(req.validate().is_err());
    }
}
