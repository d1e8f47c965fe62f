use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// 考生身份（自报，不做核验）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub full_name: String,
    pub cedula: String,
    /// 考生自带的 AI 凭证
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl User {
    /// 校验登录表单并构造考生
    ///
    /// 姓名和证件号不能为空，证件号至少 5 个字符
    pub fn from_form(
        full_name: &str,
        cedula: &str,
        api_key: Option<&str>,
    ) -> Result<Self, ValidationError> {
        let full_name = full_name.trim();
        let cedula = cedula.trim();

        if full_name.is_empty() || cedula.is_empty() {
            return Err(ValidationError::MissingFields);
        }
        if cedula.chars().count() < 5 {
            return Err(ValidationError::InvalidCedula);
        }

        Ok(Self {
            full_name: full_name.to_string(),
            cedula: cedula.to_string(),
            api_key: api_key
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_string),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_blank_fields() {
        assert_eq!(
            User::from_form("  ", "1234567", None),
            Err(ValidationError::MissingFields)
        );
        assert_eq!(
            User::from_form("Ana", "", None),
            Err(ValidationError::MissingFields)
        );
    }

    #[test]
    fn rejects_short_cedula() {
        assert_eq!(
            User::from_form("Ana Pérez", "1234", None),
            Err(ValidationError::InvalidCedula)
        );
    }

    #[test]
    fn blank_api_key_is_dropped() {
        let user = User::from_form(" Ana Pérez ", "V-12345", Some("   ")).unwrap();
        assert_eq!(user.full_name, "Ana Pérez");
        assert_eq!(user.api_key, None);

        let user = User::from_form("Ana", "V-12345", Some("key-1")).unwrap();
        assert_eq!(user.api_key.as_deref(), Some("key-1"));
    }
}
