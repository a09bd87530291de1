use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::session::ChatId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    pub amount: u32,
    pub currency: String,
}

impl Default for Price {
    fn default() -> Self {
        Self {
            amount: 100,
            currency: "USD".to_string(),
        }
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntakeSettings {
    pub price: Price,
    /// Directory generated policy documents are written to
    pub documents_dir: PathBuf,
    /// Tell the user when a policy could not be issued instead of staying silent
    pub notify_issuance_failure: bool,
}

impl Default for IntakeSettings {
    fn default() -> Self {
        Self {
            price: Price::default(),
            documents_dir: PathBuf::from("Documents"),
            notify_issuance_failure: false,
        }
    }
}

impl IntakeSettings {
    pub fn policy_file_name(&self, chat_id: ChatId) -> String {
        format!("InsurancePolicy_{}.pdf", chat_id)
    }

    pub fn policy_path(&self, chat_id: ChatId) -> PathBuf {
        self.documents_dir.join(self.policy_file_name(chat_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_path_is_per_chat() {
        let settings = IntakeSettings::default();
        assert_eq!(
            settings.policy_path(ChatId(42)),
            PathBuf::from("Documents").join("InsurancePolicy_42.pdf")
        );
        assert_eq!(settings.price.to_string(), "100 USD");
    }
}
