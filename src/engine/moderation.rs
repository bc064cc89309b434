//! Moderation sub-flow helpers: draft parsing and the admin keyboards.
//!
//! The flow itself runs inside the conversation engine; everything here is
//! pure so it can be tested without a store or resolver.

use crate::chat::{Button, Keyboard};
use crate::store::ModelRecord;

use super::session::ModelDraft;

/// Upper bound on the delete selection list.
pub const MAX_DELETE_LIST: i64 = 50;

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum DraftError {
    #[error("expected four pipe-delimited fields")]
    FieldCount,
    #[error("name must not be empty")]
    EmptyName,
    #[error("age must be an integer of at least 18")]
    Age,
    #[error("price must be a positive integer")]
    Price,
}

/// Parse one catalog line `name | age | city | price`. All-or-nothing: any
/// invalid field rejects the whole draft.
pub fn parse_draft(line: &str) -> Result<ModelDraft, DraftError> {
    let fields: Vec<&str> = line.split('|').map(str::trim).collect();
    let [name, age, city, price] = fields.as_slice() else {
        return Err(DraftError::FieldCount);
    };

    if name.is_empty() {
        return Err(DraftError::EmptyName);
    }
    let age: i64 = age.parse().map_err(|_| DraftError::Age)?;
    if age < 18 {
        return Err(DraftError::Age);
    }
    let price: i64 = price.parse().map_err(|_| DraftError::Price)?;
    if price <= 0 {
        return Err(DraftError::Price);
    }

    Ok(ModelDraft {
        name: name.to_string(),
        age,
        city: city.to_string(),
        price,
    })
}

pub fn admin_menu() -> Keyboard {
    Keyboard::rows(vec![
        vec![
            Button::new("➕ Добавить модель", "add_model"),
            Button::new("🗑 Удалить модель", "delete_model"),
        ],
        vec![
            Button::new("📊 Статистика", "stats"),
            Button::new("📦 Резервная копия", "backup"),
        ],
    ])
}

/// One button per model, plus a back row.
pub fn delete_list(models: &[ModelRecord]) -> Keyboard {
    let mut buttons: Vec<Button> = models
        .iter()
        .map(|m| Button::new(format!("{}: {}", m.id, m.name), format!("del_{}", m.id)))
        .collect();
    buttons.push(Button::new("🔙 Назад", "back_admin"));
    Keyboard::column(buttons)
}

pub fn confirm_delete_keyboard() -> Keyboard {
    Keyboard::column(vec![
        Button::new("✅ Подтвердить удаление", "confirm_del"),
        Button::new("🔙 Отмена", "cancel_del"),
    ])
}

pub fn model_summary(model: &ModelRecord) -> String {
    format!(
        "Вы уверены, что хотите удалить модель?\nID: {}\nИмя: {}\nГород: {}",
        model.id, model.name, model.city
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_draft() {
        let draft = parse_draft("Анна | 25 | Москва | 5000").unwrap();
        assert_eq!(draft.name, "Анна");
        assert_eq!(draft.age, 25);
        assert_eq!(draft.city, "Москва");
        assert_eq!(draft.price, 5000);
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let draft = parse_draft("  Ева|18|  Сочи  |1   ").unwrap();
        assert_eq!(draft.name, "Ева");
        assert_eq!(draft.age, 18);
        assert_eq!(draft.city, "Сочи");
        assert_eq!(draft.price, 1);
    }

    #[test]
    fn test_parse_wrong_field_count() {
        assert_eq!(parse_draft("Анна | 25 | Москва").unwrap_err(), DraftError::FieldCount);
        assert_eq!(parse_draft("a | 20 | b | 10 | extra").unwrap_err(), DraftError::FieldCount);
        assert_eq!(parse_draft("").unwrap_err(), DraftError::FieldCount);
    }

    #[test]
    fn test_parse_empty_name() {
        assert_eq!(parse_draft(" | 25 | Москва | 5000").unwrap_err(), DraftError::EmptyName);
    }

    #[test]
    fn test_parse_underage() {
        assert_eq!(parse_draft("Анна | 17 | Москва | 5000").unwrap_err(), DraftError::Age);
    }

    #[test]
    fn test_parse_non_numeric_age() {
        assert_eq!(parse_draft("Анна | двадцать | Москва | 5000").unwrap_err(), DraftError::Age);
    }

    #[test]
    fn test_parse_non_positive_price() {
        assert_eq!(parse_draft("Анна | 25 | Москва | 0").unwrap_err(), DraftError::Price);
        assert_eq!(parse_draft("Анна | 25 | Москва | -5").unwrap_err(), DraftError::Price);
    }

    #[test]
    fn test_delete_list_has_back_button() {
        let models = vec![ModelRecord {
            id: 3,
            name: "Анна".into(),
            age: 25,
            city: "Москва".into(),
            photo_ref: "p".into(),
            price: 5000,
        }];
        let keyboard = delete_list(&models);
        assert_eq!(keyboard.rows.len(), 2);
        assert_eq!(keyboard.rows[0][0].token, "del_3");
        assert_eq!(keyboard.rows[1][0].token, "back_admin");
    }
}
