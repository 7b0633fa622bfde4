//! Image metadata attributes.
//!
//! Keys are kept sorted so containers serialize deterministically.

use std::collections::BTreeMap;

/// Well-known attribute keys.
pub mod keys {
    /// Width declared by the source file header.
    pub const IMAGE_WIDTH: &str = "ImageWidth";
    /// Height declared by the source file header.
    pub const IMAGE_HEIGHT: &str = "ImageHeight";
    /// Maker note field 33 (branch selector).
    pub const MAKER_33: &str = "Maker33";
    /// Maker note field 48 (headroom coefficient).
    pub const MAKER_48: &str = "Maker48";
    /// Headroom the maker fields were derived from, in stops.
    pub const HEADROOM_STOPS: &str = "HeadroomStops";
    /// Software tag.
    pub const SOFTWARE: &str = "Software";
}

/// Typed metadata value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    /// Text.
    Str(String),
    /// Count or code.
    UInt(u32),
    /// Single-precision number.
    Float(f32),
    /// Double-precision number; maker fields use this.
    Double(f64),
}

impl AttrValue {
    /// Text content, for [`AttrValue::Str`] only.
    pub fn as_str(&self) -> Option<&str> {
        if let Self::Str(s) = self { Some(s) } else { None }
    }

    /// Integer content, for [`AttrValue::UInt`] only.
    pub fn as_u32(&self) -> Option<u32> {
        if let Self::UInt(n) = self { Some(*n) } else { None }
    }

    /// Any numeric variant widened to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        Some(match *self {
            Self::UInt(n) => n.into(),
            Self::Float(x) => x.into(),
            Self::Double(x) => x,
            Self::Str(_) => return None,
        })
    }
}

/// Ordered attribute map carried by every [`Image`](crate::Image).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attrs {
    map: BTreeMap<String, AttrValue>,
}

impl Attrs {
    /// Empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key`, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: AttrValue) {
        self.map.insert(key.into(), value);
    }

    /// Value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.map.get(key)
    }

    /// `key` has a value.
    pub fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    /// Entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &AttrValue)> {
        self.map.iter()
    }

    /// Entry count.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// No entries.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Dimensions declared by the source header, if both are present.
    pub fn declared_dimensions(&self) -> Option<(u32, u32)> {
        let w = self.get(keys::IMAGE_WIDTH)?.as_u32()?;
        let h = self.get(keys::IMAGE_HEIGHT)?.as_u32()?;
        Some((w, h))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get() {
        let mut meta = Attrs::new();
        meta.set(keys::MAKER_48, AttrValue::Double(0.25));
        meta.set(keys::SOFTWARE, AttrValue::Str("gainmap".into()));
        meta.set(keys::IMAGE_WIDTH, AttrValue::UInt(8));
        assert_eq!(meta.get(keys::MAKER_48).and_then(AttrValue::as_f64), Some(0.25));
        assert_eq!(meta.get(keys::IMAGE_WIDTH).and_then(AttrValue::as_f64), Some(8.0));
        assert_eq!(meta.get(keys::SOFTWARE).and_then(AttrValue::as_str), Some("gainmap"));
        assert!(!meta.contains("missing"));
        assert_eq!(meta.len(), 3);
    }

    #[test]
    fn test_iteration_is_sorted() {
        let mut attrs = Attrs::new();
        attrs.set("b", AttrValue::UInt(2));
        attrs.set("a", AttrValue::UInt(1));
        let keys: Vec<&str> = attrs.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn test_declared_dimensions() {
        let mut attrs = Attrs::new();
        assert_eq!(attrs.declared_dimensions(), None);
        attrs.set(keys::IMAGE_WIDTH, AttrValue::UInt(64));
        attrs.set(keys::IMAGE_HEIGHT, AttrValue::UInt(32));
        assert_eq!(attrs.declared_dimensions(), Some((64, 32)));
    }
}
