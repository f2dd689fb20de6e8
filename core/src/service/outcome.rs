use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Error,
}

/// Why a domain action did or did not happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeCode {
    Ok,
    DailyLimitReached,
    FavoritesLimitReached,
    TemplateItemLimitReached,
    NotFound,
    FoodUnavailable,
}

impl OutcomeCode {
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            OutcomeCode::Ok => "ok",
            OutcomeCode::DailyLimitReached => "daily log limit reached",
            OutcomeCode::FavoritesLimitReached => "favorites limit reached",
            OutcomeCode::TemplateItemLimitReached => "template item limit reached",
            OutcomeCode::NotFound => "not found",
            OutcomeCode::FoodUnavailable => "food is no longer available",
        }
    }
}

/// Result of a domain action that can be refused by a business rule.
///
/// A refusal is an ordinary value, not an error: `status` is `error`, `code` says
/// which rule applied and `value` is `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome<T> {
    pub status: Status,
    pub code: OutcomeCode,
    pub value: Option<T>,
}

impl<T> Outcome<T> {
    pub fn ok(value: T) -> Self {
        Self {
            status: Status::Ok,
            code: OutcomeCode::Ok,
            value: Some(value),
        }
    }

    pub fn rejected(code: OutcomeCode) -> Self {
        debug_assert!(code != OutcomeCode::Ok);
        Self {
            status: Status::Error,
            code,
            value: None,
        }
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }

    pub fn into_value(self) -> Option<T> {
        self.value
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome {
            status: self.status,
            code: self.code,
            value: self.value.map(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_serializes_null_value() {
        let outcome: Outcome<u32> = Outcome::rejected(OutcomeCode::DailyLimitReached);
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["code"], "DAILY_LIMIT_REACHED");
        assert!(json["value"].is_null());
    }

    #[test]
    fn test_ok_serializes_value() {
        let json = serde_json::to_value(Outcome::ok(7)).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["code"], "OK");
        assert_eq!(json["value"], 7);
    }

    #[test]
    fn test_map_keeps_code() {
        let outcome = Outcome::<u32>::rejected(OutcomeCode::NotFound).map(|v| v * 2);
        assert!(!outcome.is_ok());
        assert_eq!(outcome.code, OutcomeCode::NotFound);
        assert_eq!(Outcome::ok(2).map(|v| v * 2).into_value(), Some(4));
    }
}
