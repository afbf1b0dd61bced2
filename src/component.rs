use serde::{
    de::{self, Visitor},
    Deserialize, Deserializer, Serialize, Serializer,
};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Color {
    Black,
    DarkBlue,
    DarkGreen,
    DarkAqua,
    DarkRed,
    DarkPurple,
    Gold,
    Gray,
    DarkGray,
    Blue,
    Green,
    Aqua,
    Red,
    LightPurple,
    Yellow,
    White,
    #[serde(serialize_with = "color_serialize", deserialize_with = "color_deserialize")]
    #[serde(untagged)]
    Rgb(u8, u8, u8),
}

impl Color {
    /// Section-sign code used by pre-JSON clients, `None` for RGB colors.
    pub const fn legacy_code(&self) -> Option<char> {
        Some(match self {
            Color::Black => '0',
            Color::DarkBlue => '1',
            Color::DarkGreen => '2',
            Color::DarkAqua => '3',
            Color::DarkRed => '4',
            Color::DarkPurple => '5',
            Color::Gold => '6',
            Color::Gray => '7',
            Color::DarkGray => '8',
            Color::Blue => '9',
            Color::Green => 'a',
            Color::Aqua => 'b',
            Color::Red => 'c',
            Color::LightPurple => 'd',
            Color::Yellow => 'e',
            Color::White => 'f',
            Color::Rgb(..) => return None,
        })
    }
}

fn color_serialize<S>(red: &u8, green: &u8, blue: &u8, s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    s.serialize_str(&format!("#{:02X}{:02X}{:02X}", red, green, blue))
}

fn color_deserialize<'de, D>(d: D) -> Result<(u8, u8, u8), D::Error>
where
    D: Deserializer<'de>,
{
    d.deserialize_str(ColorVisitor)
}

fn hex<E>(src: &[u8]) -> Result<u8, E>
where
    E: de::Error,
{
    let str = String::from_utf8_lossy(src);
    u8::from_str_radix(&str, 16).map_err(|e| E::custom(e))
}

struct ColorVisitor;

impl<'de> Visitor<'de> for ColorVisitor {
    type Value = (u8, u8, u8);

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str("a string color in hex")
    }

    fn visit_str<E>(self, str: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        let bytes = str.as_bytes();
        if str.len() != 7 || bytes[0] != b'#' {
            return Err(E::custom("string is not a color"));
        }

        Ok((hex(&bytes[1..=2])?, hex(&bytes[3..=4])?, hex(&bytes[5..=6])?))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum Content {
    Text {
        text: String,
    },
    Translation {
        translate: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        with: Option<Vec<Component>>,
    },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Component {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bold: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub italic: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<Vec<Component>>,
    #[serde(flatten)]
    pub content: Content,
}

impl Component {
    pub const fn content(content: Content) -> Self {
        Self {
            content,
            bold: None,
            italic: None,
            color: None,
            extra: None,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::content(Content::Text { text: text.into() })
    }

    pub fn translatable(key: &str) -> Self {
        Self::content(Content::Translation { translate: key.to_owned(), with: None })
    }

    pub fn color(mut self, color: Color) -> Self {
        self.color = Some(color);
        self
    }

    pub fn push(&mut self, component: Component) {
        self.extra.get_or_insert(Vec::new()).push(component)
    }

    /// Flattens the component into section-sign formatted text.
    pub fn to_legacy_string(&self) -> String {
        let mut out = String::new();
        self.write_legacy(&mut out);
        out
    }

    fn write_legacy(&self, out: &mut String) {
        if let Some(code) = self.color.as_ref().and_then(Color::legacy_code) {
            out.push('§');
            out.push(code);
        }
        match &self.content {
            Content::Text { text } => out.push_str(text),
            Content::Translation { translate, .. } => out.push_str(translate),
        }
        for child in self.extra.iter().flatten() {
            child.write_legacy(out);
        }
    }

    pub fn to_json(&self) -> String {
        // Serializing a tree of strings and options cannot fail.
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{\"text\":\"\"}"))
    }
}
