//! Scene — the 2D canvas that gets projected onto the table.
//!
//! DESIGN
//! ======
//! The scene is sized in physical units: the table's width and height in
//! meters times a pixels-per-meter scale gives the raster size. Items live
//! in insertion order (first added, first drawn) and are addressed by a
//! monotonic `ItemId`. Visibility is per item; calibration hides everything
//! and later restores it, so the scene can snapshot and replay visibility.

use std::collections::HashMap;

use crate::config::TableGeometry;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(u64);

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "item-{}", self.0)
    }
}

/// Straight (non-premultiplied) RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const WHITE: Self = Self { r: 255, g: 255, b: 255, a: 255 };
    pub const BLACK: Self = Self { r: 0, g: 0, b: 0, a: 255 };
}

/// Position in scene pixels (top-left origin).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ItemKind {
    Rect { width: f64, height: f64 },
    /// Ellipse inscribed in the `width x height` box at the item position.
    Ellipse { width: f64, height: f64 },
    /// Single-line text; the position is the top-left of the line box.
    Text { text: String, size_px: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub id: ItemId,
    pub kind: ItemKind,
    pub pos: Point,
    pub color: Rgba,
    pub visible: bool,
}

/// Per-item visibility captured before a bulk hide.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisibilitySnapshot(HashMap<ItemId, bool>);

impl VisibilitySnapshot {
    #[must_use]
    pub fn was_visible(&self, id: ItemId) -> Option<bool> {
        self.0.get(&id).copied()
    }
}

// =============================================================================
// SCENE
// =============================================================================

#[derive(Debug, Clone)]
pub struct Scene {
    width_px: u32,
    height_px: u32,
    /// Table corner in meters; positions are measured from here.
    origin: (f64, f64),
    pixels_per_meter: f64,
    background: Rgba,
    items: Vec<Item>,
    next_id: u64,
}

impl Scene {
    /// Size the canvas from the table geometry.
    ///
    /// Width is `width_m * ppm`; height keeps the table's aspect ratio.
    #[must_use]
    pub fn new(table: &TableGeometry) -> Self {
        let width = table.width_m * table.pixels_per_meter;
        let height = table.height_m / table.width_m * width;
        Self {
            width_px: to_px(width),
            height_px: to_px(height),
            origin: (table.origin_x, table.origin_y),
            pixels_per_meter: table.pixels_per_meter,
            background: Rgba::BLACK,
            items: Vec::new(),
            next_id: 1,
        }
    }

    #[must_use]
    pub fn width_px(&self) -> u32 {
        self.width_px
    }

    #[must_use]
    pub fn height_px(&self) -> u32 {
        self.height_px
    }

    #[must_use]
    pub fn pixels_per_meter(&self) -> f64 {
        self.pixels_per_meter
    }

    #[must_use]
    pub fn background(&self) -> Rgba {
        self.background
    }

    /// Convert a table position in meters to scene pixels, relative to the
    /// table origin.
    #[must_use]
    pub fn meters_to_px(&self, x_m: f64, y_m: f64) -> Point {
        let (ox, oy) = self.origin;
        Point::new((x_m - ox) * self.pixels_per_meter, (y_m - oy) * self.pixels_per_meter)
    }

    /// Add a visible item and return its id.
    pub fn add(&mut self, kind: ItemKind, pos: Point, color: Rgba) -> ItemId {
        let id = ItemId(self.next_id);
        self.next_id += 1;
        self.items.push(Item { id, kind, pos, color, visible: true });
        id
    }

    pub fn remove(&mut self, id: ItemId) -> Option<Item> {
        let idx = self.items.iter().position(|it| it.id == id)?;
        Some(self.items.remove(idx))
    }

    #[cfg(test)]
    #[must_use]
    pub fn get(&self, id: ItemId) -> Option<&Item> {
        self.items.iter().find(|it| it.id == id)
    }

    /// Move an item. Returns `false` if the id is unknown.
    pub fn set_pos(&mut self, id: ItemId, pos: Point) -> bool {
        let Some(item) = self.items.iter_mut().find(|it| it.id == id) else {
            return false;
        };
        item.pos = pos;
        true
    }

    #[cfg(test)]
    /// Show or hide an item. Returns `false` if the id is unknown.
    pub fn set_visible(&mut self, id: ItemId, visible: bool) -> bool {
        let Some(item) = self.items.iter_mut().find(|it| it.id == id) else {
            return false;
        };
        item.visible = visible;
        true
    }

    #[cfg(test)]
    /// Items in draw order.
    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.items.iter()
    }

    /// Visible items in draw order.
    pub fn visible_items(&self) -> impl Iterator<Item = &Item> {
        self.items.iter().filter(|it| it.visible)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Hide every item, returning the visibility each had before.
    pub fn hide_all(&mut self) -> VisibilitySnapshot {
        let mut snapshot = HashMap::with_capacity(self.items.len());
        for item in &mut self.items {
            snapshot.insert(item.id, item.visible);
            item.visible = false;
        }
        VisibilitySnapshot(snapshot)
    }

    pub fn show_all(&mut self) {
        for item in &mut self.items {
            item.visible = true;
        }
    }

    /// Reapply a snapshot. Items added after the snapshot become visible.
    pub fn restore_visibility(&mut self, snapshot: &VisibilitySnapshot) {
        for item in &mut self.items {
            item.visible = snapshot.was_visible(item.id).unwrap_or(true);
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_px(value: f64) -> u32 {
    if value.is_finite() && value >= 1.0 {
        value.min(f64::from(u32::MAX)) as u32
    } else {
        1
    }
}

#[cfg(test)]
#[path = "scene_test.rs"]
mod tests;
