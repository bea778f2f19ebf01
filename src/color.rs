//! Palette-based auto coloring and color value resolution.
//!
//! Uncolored records can be grouped by an accessor-derived key and assigned
//! palette colors in first-seen group order, cycling when the group count
//! exceeds the palette. The palette is scoped to one assignment pass; there is
//! no shared mutable color state across engine instances.

use std::collections::HashMap;

use serde_json::Value;

use crate::graph::{Accessor, Fields};

/// ColorBrewer "Paired" scheme, the classic 12-color qualitative set.
pub const PALETTE: [&str; 12] = [
    "#a6cee3", "#1f78b4", "#b2df8a", "#33a02c", "#fb9a99", "#e31a1c", "#fdbf6f", "#ff7f00",
    "#cab2d6", "#6a3d9a", "#ffff99", "#b15928",
];

/// Fallback color for nodes without a resolvable color.
pub const DEFAULT_NODE_COLOR: u32 = 0xffffaa;

/// Fallback color for links without a resolvable color.
pub const DEFAULT_LINK_COLOR: u32 = 0xf0f0f0;

/// Assign palette colors to records that do not yet carry one.
///
/// Records whose `color_field` already holds a non-empty value are left
/// untouched. The rest are grouped by the stringified `group_by` value; each
/// distinct group gets the next palette color in order of first appearance,
/// wrapping modulo the palette length. No-op when `group_by` is unset.
pub fn assign_group_colors<'a, I>(records: I, group_by: &Accessor, color_field: &str)
where
    I: IntoIterator<Item = &'a mut Fields>,
{
    if !group_by.is_set() || color_field.is_empty() {
        return;
    }

    let mut group_order: HashMap<String, usize> = HashMap::new();

    for fields in records {
        if has_color(fields, color_field) {
            continue;
        }

        let group = stringify(&group_by.value(fields));
        let next = group_order.len();
        let idx = *group_order.entry(group).or_insert(next);

        fields.insert(
            color_field.to_owned(),
            Value::String(PALETTE[idx % PALETTE.len()].to_owned()),
        );
    }
}

/// A record counts as colored when the field holds any truthy value.
fn has_color(fields: &Fields, color_field: &str) -> bool {
    match fields.get(color_field) {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
        Some(_) => true,
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Resolve a color value into a 24-bit hex color.
///
/// Already-numeric values pass through unchanged (truncated to 24 bits);
/// strings are parsed as CSS-like colors. Unparseable values yield `None` so
/// the caller can substitute its default.
pub fn resolve_color(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_f64().map(|v| (v as u32) & 0xffffff),
        Value::String(s) => parse_color_str(s),
        _ => None,
    }
}

/// Parse a CSS-like color string: `#rgb`, `#rrggbb`, `rgb()`/`rgba()`, or one
/// of a small set of named colors.
pub fn parse_color_str(s: &str) -> Option<u32> {
    let s = s.trim();

    if let Some(hex) = s.strip_prefix('#') {
        return match hex.len() {
            3 => {
                let value = u32::from_str_radix(hex, 16).ok()?;
                let (r, g, b) = ((value >> 8) & 0xf, (value >> 4) & 0xf, value & 0xf);
                Some((r * 0x11) << 16 | (g * 0x11) << 8 | (b * 0x11))
            }
            6 => u32::from_str_radix(hex, 16).ok(),
            _ => None,
        };
    }

    let lower = s.to_ascii_lowercase();
    if let Some(body) = lower
        .strip_prefix("rgba(")
        .or_else(|| lower.strip_prefix("rgb("))
    {
        let body = body.strip_suffix(')')?;
        let mut parts = body.split(',').map(str::trim);
        let r: u32 = parts.next()?.parse().ok()?;
        let g: u32 = parts.next()?.parse().ok()?;
        let b: u32 = parts.next()?.parse().ok()?;
        if r > 255 || g > 255 || b > 255 {
            return None;
        }
        return Some(r << 16 | g << 8 | b);
    }

    named_color(&lower)
}

fn named_color(name: &str) -> Option<u32> {
    Some(match name {
        "black" => 0x000000,
        "white" => 0xffffff,
        "red" => 0xff0000,
        "green" => 0x008000,
        "lime" => 0x00ff00,
        "blue" => 0x0000ff,
        "yellow" => 0xffff00,
        "cyan" | "aqua" => 0x00ffff,
        "magenta" | "fuchsia" => 0xff00ff,
        "gray" | "grey" => 0x808080,
        "orange" => 0xffa500,
        "purple" => 0x800080,
        _ => return None,
    })
}
