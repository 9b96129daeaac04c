use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumCount, EnumIter, EnumString, FromRepr};

/// Fixed label table of the tumor classifier. The discriminant is the class
/// index produced by the network head.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    AsRefStr,
    EnumString,
    EnumIter,
    EnumCount,
    FromRepr,
)]
#[repr(usize)]
pub enum TumorClass {
    None = 0,
    Meningioma = 1,
    Glioma = 2,
    Pituitary = 3,
}

impl TumorClass {
    pub fn id(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            TumorClass::None => "None",
            TumorClass::Meningioma => "Meningioma",
            TumorClass::Glioma => "Glioma",
            TumorClass::Pituitary => "Pituitary",
        }
    }
}

/// Body returned by `POST /predict`. `class_id` is sent as a decimal string.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PredictionResponse {
    pub class_id: String,
    pub class_name: String,
}

impl From<TumorClass> for PredictionResponse {
    fn from(class: TumorClass) -> Self {
        Self {
            class_id: class.id().to_string(),
            class_name: class.label().to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::{EnumCount, IntoEnumIterator};

    #[test]
    fn label_table_has_four_entries_in_index_order() {
        assert_eq!(TumorClass::COUNT, 4);
        let labels: Vec<_> = TumorClass::iter().map(TumorClass::label).collect();
        assert_eq!(labels, ["None", "Meningioma", "Glioma", "Pituitary"]);
        for (i, class) in TumorClass::iter().enumerate() {
            assert_eq!(class.id(), i);
            assert_eq!(TumorClass::from_repr(i), Some(class));
        }
        assert_eq!(TumorClass::from_repr(4), None);
    }

    #[test]
    fn display_and_parse_use_the_label() {
        assert_eq!(TumorClass::Glioma.to_string(), "Glioma");
        assert_eq!(TumorClass::from_str("Meningioma").unwrap(), TumorClass::Meningioma);
    }

    #[test]
    fn prediction_response_serialises_id_as_string() {
        let body = serde_json::to_value(PredictionResponse::from(TumorClass::Pituitary)).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"class_id": "3", "class_name": "Pituitary"})
        );
    }
}
