use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[cfg_attr(feature = "backend-sql", derive(sqlx::FromRow))]
pub struct Fruit {
    pub id: String,
    pub name: String,
    pub color: String,

    #[serde(rename = "readyToEat")]
    pub ready_to_eat: bool,

    pub owner: String,
}

/// The mutable half of a fruit record - everything the owner can set
/// through the create and edit forms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FruitData {
    pub name: String,
    pub color: String,
    pub ready_to_eat: bool,
}

#[derive(Debug, Deserialize)]
pub struct FruitForm {
    pub name: String,
    pub color: String,

    // checkboxes submit the string "on", or nothing at all
    #[serde(rename = "readyToEat")]
    pub ready_to_eat: Option<String>,
}

/// A plain form POST standing in for PUT/DELETE, which html forms
/// can't send themselves. `_method` picks the verb.
#[derive(Debug, Deserialize)]
pub struct FruitOverrideForm {
    #[serde(rename = "_method")]
    pub method: String,

    pub name: Option<String>,
    pub color: Option<String>,

    #[serde(rename = "readyToEat")]
    pub ready_to_eat: Option<String>,
}

impl FruitForm {
    pub fn normalised(self) -> FruitData {
        FruitData {
            name: self.name,
            color: self.color,
            ready_to_eat: checkbox(self.ready_to_eat.as_deref()),
        }
    }
}

impl FruitOverrideForm {
    pub fn into_parts(self) -> (String, FruitForm) {
        (
            self.method,
            FruitForm {
                name: self.name.unwrap_or_default(),
                color: self.color.unwrap_or_default(),
                ready_to_eat: self.ready_to_eat,
            },
        )
    }
}

fn checkbox(value: Option<&str>) -> bool {
    value == Some("on")
}

pub fn starters() -> Vec<FruitData> {
    [
        ("Orange", "orange"),
        ("Grape", "purple"),
        ("Banana", "orange"),
        ("Strawberry", "red"),
        ("Coconut", "brown"),
    ]
    .into_iter()
    .map(|(name, color)| FruitData {
        name: name.into(),
        color: color.into(),
        ready_to_eat: false,
    })
    .collect()
}
