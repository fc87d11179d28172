//! VK bot keyboard markup.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ButtonColor {
    Primary,
    Secondary,
    Negative,
    Positive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ButtonAction {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub label: String,
    /// JSON string, as VK expects
    pub payload: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Button {
    pub action: ButtonAction,
    pub color: ButtonColor,
}

/// Keyboard attached to an outgoing message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Keyboard {
    pub one_time: bool,
    pub inline: bool,
    pub buttons: Vec<Vec<Button>>,
}

impl Keyboard {
    pub fn new(one_time: bool, inline: bool) -> Self {
        Self {
            one_time,
            inline,
            buttons: vec![vec![]],
        }
    }

    /// Append a text button to the current row
    pub fn add_button(mut self, label: impl Into<String>, color: ButtonColor) -> Self {
        let button = Button {
            action: ButtonAction {
                kind: "text",
                label: label.into(),
                payload: r#"{"button":"1"}"#.to_string(),
            },
            color,
        };
        match self.buttons.last_mut() {
            Some(row) => row.push(button),
            None => self.buttons.push(vec![button]),
        }
        self
    }

    /// Start a new row of buttons
    pub fn add_line(mut self) -> Self {
        self.buttons.push(vec![]);
        self
    }

    /// Labels of every button, row by row
    pub fn labels(&self) -> Vec<&str> {
        self.buttons
            .iter()
            .flatten()
            .map(|button| button.action.label.as_str())
            .collect()
    }

    /// Serialize to the JSON string sent in the `keyboard` parameter
    pub fn to_json(&self) -> String {
        let rows: Vec<&Vec<Button>> = self.buttons.iter().filter(|row| !row.is_empty()).collect();
        serde_json::json!({
            "one_time": self.one_time,
            "inline": self.inline,
            "buttons": rows,
        })
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_keyboard_json_layout() {
        let keyboard = Keyboard::new(true, false)
            .add_button("👍", ButtonColor::Positive)
            .add_button("❌", ButtonColor::Negative);

        let value: Value = serde_json::from_str(&keyboard.to_json()).unwrap();
        assert_eq!(value["one_time"], true);
        assert_eq!(value["inline"], false);
        assert_eq!(value["buttons"][0][0]["action"]["type"], "text");
        assert_eq!(value["buttons"][0][0]["action"]["label"], "👍");
        assert_eq!(value["buttons"][0][1]["color"], "negative");
    }

    #[test]
    fn test_empty_rows_are_dropped() {
        let keyboard = Keyboard::new(false, false)
            .add_button("a", ButtonColor::Primary)
            .add_line()
            .add_line()
            .add_button("b", ButtonColor::Secondary);

        let value: Value = serde_json::from_str(&keyboard.to_json()).unwrap();
        assert_eq!(value["buttons"].as_array().unwrap().len(), 2);
        assert_eq!(keyboard.labels(), vec!["a", "b"]);
    }
}
