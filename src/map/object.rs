use crate::Color;

/// Alpha given to an object group's color when the group specifies one.
pub const OBJECT_GROUP_ALPHA: u8 = 128;

/// Rectangle placed on the map, in pixels.
#[derive(Clone, PartialEq, Debug)]
pub struct Object {
    pub id: u32,
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Clone, PartialEq, Debug)]
pub struct ObjectGroup {
    pub name: String,
    pub color: Color,
    pub visible: bool,
    pub objects: Vec<Object>,
}

impl Default for ObjectGroup {
    fn default() -> Self {
        Self {
            name: String::new(),
            color: Color::WHITE,
            visible: true,
            objects: Vec::new(),
        }
    }
}
