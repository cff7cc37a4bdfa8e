use bytemuck::{Pod, Zeroable};

#[repr(C)]
#[derive(Copy, Clone, PartialEq, Debug, Pod, Zeroable)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

impl Color {

    pub const WHITE: Color      = Color::new(1.0, 1.0, 1.0, 1.0);
    pub const BLACK: Color      = Color::new(0.0, 0.0, 0.0, 1.0);
    pub const RED: Color        = Color::new(1.0, 0.0, 0.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Color from 8-bit channels.
    pub fn from_rgba8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self::new(
            r as f32 / 255.0,
            g as f32 / 255.0,
            b as f32 / 255.0,
            a as f32 / 255.0,
        )
    }

    /// Channels rounded back to 8 bits.
    pub fn to_rgba8(self) -> [u8; 4] {
        let quantize = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        [quantize(self.r), quantize(self.g), quantize(self.b), quantize(self.a)]
    }

    /// Parses a `#RRGGBB` string with the supplied alpha.
    /// The `#AARRGGBB` form Tiled writes is accepted too, its alpha is discarded.
    pub fn from_hex(value: &str, alpha: u8) -> Option<Self> {
        let digits = value.strip_prefix('#')?;
        if !digits.is_ascii() {
            return None;
        }
        let rgb = match digits.len() {
            6 => digits,
            8 => &digits[2..],
            _ => return None,
        };
        let channel = |i: usize| u8::from_str_radix(rgb.get(i..i + 2)?, 16).ok();
        Some(Self::from_rgba8(channel(0)?, channel(2)?, channel(4)?, alpha))
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

#[cfg(test)]
mod test {
    use super::Color;

    #[test]
    fn parses_rgb_hex() {
        let color = Color::from_hex("#FF8000", 255).unwrap();
        assert_eq!(color.to_rgba8(), [255, 128, 0, 255]);
    }

    #[test]
    fn discards_argb_alpha() {
        let color = Color::from_hex("#4000FF00", 128).unwrap();
        assert_eq!(color.to_rgba8(), [0, 255, 0, 128]);
    }

    #[test]
    fn rejects_malformed_hex() {
        assert_eq!(Color::from_hex("FF8000", 255), None);
        assert_eq!(Color::from_hex("#FF80", 255), None);
        assert_eq!(Color::from_hex("#GG8000", 255), None);
    }
}
