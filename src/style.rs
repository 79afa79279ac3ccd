//! Draw styles: CSS-style color parsing and the per-record color rule.

use image::Rgba;
use serde::{Deserialize, Serialize};

use crate::error::{DotmapError, Result};

/// Parse a CSS-style color string: `rgba(r,g,b,a)`, `rgb(r,g,b)`, `#rgb`,
/// `#rrggbb` or `#rrggbbaa`. The rgba() alpha component is a 0..=1 float.
pub fn parse_color(s: &str) -> Result<Rgba<u8>> {
    let s = s.trim();

    if let Some(hex) = s.strip_prefix('#') {
        return parse_hex(hex, s);
    }

    let (body, has_alpha) = if let Some(body) = s.strip_prefix("rgba(") {
        (body, true)
    } else if let Some(body) = s.strip_prefix("rgb(") {
        (body, false)
    } else {
        return Err(invalid_color(s, "expected rgba(...), rgb(...) or #hex"));
    };

    let body = body
        .strip_suffix(')')
        .ok_or_else(|| invalid_color(s, "missing closing parenthesis"))?;

    let parts: Vec<&str> = body.split(',').map(str::trim).collect();
    let expected = if has_alpha { 4 } else { 3 };
    if parts.len() != expected {
        return Err(invalid_color(
            s,
            &format!("expected {} components, got {}", expected, parts.len()),
        ));
    }

    let mut channels = [0u8; 3];
    for (i, part) in parts.iter().take(3).enumerate() {
        channels[i] = part
            .parse::<u8>()
            .map_err(|_| invalid_color(s, &format!("invalid channel value: {}", part)))?;
    }

    let alpha = if has_alpha {
        let a = parts[3]
            .parse::<f64>()
            .map_err(|_| invalid_color(s, &format!("invalid alpha value: {}", parts[3])))?;
        if !(0.0..=1.0).contains(&a) {
            return Err(invalid_color(s, "alpha must be in the range 0 to 1"));
        }
        (a * 255.0).round() as u8
    } else {
        255
    };

    Ok(Rgba([channels[0], channels[1], channels[2], alpha]))
}

fn parse_hex(hex: &str, original: &str) -> Result<Rgba<u8>> {
    let nibble = |c: char| -> Result<u8> {
        c.to_digit(16)
            .map(|d| d as u8)
            .ok_or_else(|| invalid_color(original, &format!("invalid hex digit: {}", c)))
    };
    let chars: Vec<char> = hex.chars().collect();

    match chars.len() {
        3 => {
            let mut rgb = [0u8; 3];
            for (i, c) in chars.iter().enumerate() {
                let v = nibble(*c)?;
                rgb[i] = v << 4 | v;
            }
            Ok(Rgba([rgb[0], rgb[1], rgb[2], 255]))
        }
        6 | 8 => {
            let mut bytes = [255u8; 4];
            for (i, pair) in chars.chunks(2).enumerate() {
                bytes[i] = nibble(pair[0])? << 4 | nibble(pair[1])?;
            }
            Ok(Rgba(bytes))
        }
        _ => Err(invalid_color(original, "hex colors are #rgb, #rrggbb or #rrggbbaa")),
    }
}

fn invalid_color(value: &str, message: &str) -> DotmapError {
    DotmapError::InvalidParameter {
        param: "color".to_string(),
        message: format!("{}: {}", value, message),
    }
}

/// Scale a color's alpha channel by a global 0..=1 factor.
pub fn with_global_alpha(color: Rgba<u8>, alpha: f64) -> Rgba<u8> {
    let Rgba([r, g, b, a]) = color;
    Rgba([r, g, b, (a as f64 * alpha).round().clamp(0.0, 255.0) as u8])
}

/// Configuration form of a field-based color rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColorRuleConfig {
    /// Record field the rule reads
    pub field: String,

    /// Ordered substring-match table; first hit wins
    #[serde(rename = "match")]
    pub table: Vec<ColorMatchConfig>,

    /// Color for records with no table hit or a missing field
    pub default: Option<String>,
}

/// One entry of the substring-match table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColorMatchConfig {
    pub contains: String,
    pub color: String,
}

/// How a record's draw color is chosen.
#[derive(Debug, Clone)]
pub enum ColorRule {
    /// Every record gets the same color
    Fixed(Rgba<u8>),
    /// Color looked up by substring match on one record field
    FieldMatch {
        field: String,
        table: Vec<(String, Rgba<u8>)>,
        fallback: Rgba<u8>,
    },
}

impl ColorRule {
    /// Build a rule from its configuration form. `fallback` is used when the
    /// config omits a default color; `alpha` is the global alpha, baked into
    /// every color once at build time.
    pub fn from_config(config: &ColorRuleConfig, fallback: Rgba<u8>, alpha: f64) -> Result<Self> {
        let mut table = Vec::with_capacity(config.table.len());
        for entry in &config.table {
            table.push((
                entry.contains.clone(),
                with_global_alpha(parse_color(&entry.color)?, alpha),
            ));
        }
        let fallback = match &config.default {
            Some(color) => with_global_alpha(parse_color(color)?, alpha),
            None => fallback,
        };
        Ok(Self::FieldMatch {
            field: config.field.clone(),
            table,
            fallback,
        })
    }

    /// The record field this rule reads, if any.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Fixed(_) => None,
            Self::FieldMatch { field, .. } => Some(field),
        }
    }

    /// Resolve the draw color for a record's tag value.
    pub fn color_for(&self, tag: Option<&str>) -> Rgba<u8> {
        match self {
            Self::Fixed(color) => *color,
            Self::FieldMatch {
                table, fallback, ..
            } => match tag {
                Some(value) => table
                    .iter()
                    .find(|(needle, _)| value.contains(needle.as_str()))
                    .map(|(_, color)| *color)
                    .unwrap_or(*fallback),
                None => *fallback,
            },
        }
    }
}

/// All draw colors for a run, parsed once from configuration. The global
/// alpha is baked into the data colors only; background, outline and extent
/// colors keep their own alpha, matching the canvas paint order where the
/// alpha takes effect just before the data pass.
#[derive(Debug, Clone)]
pub struct Style {
    pub background: Rgba<u8>,
    pub world_color: Option<Rgba<u8>>,
    pub extent_color: Option<Rgba<u8>>,
    pub point_rule: ColorRule,
    pub box_rule: ColorRule,
}

impl Style {
    pub fn from_config(config: &crate::config::Config) -> Result<Self> {
        let fill = with_global_alpha(parse_color(&config.fill)?, config.alpha);
        let stroke = with_global_alpha(parse_color(&config.stroke)?, config.alpha);

        let (point_rule, box_rule) = match &config.color_rule {
            Some(rule) => (
                ColorRule::from_config(rule, fill, config.alpha)?,
                ColorRule::from_config(rule, stroke, config.alpha)?,
            ),
            None => (ColorRule::Fixed(fill), ColorRule::Fixed(stroke)),
        };

        Ok(Self {
            background: parse_color(&config.background)?,
            world_color: config.world_color.as_deref().map(parse_color).transpose()?,
            extent_color: config
                .extent_color
                .as_deref()
                .map(parse_color)
                .transpose()?,
            point_rule,
            box_rule,
        })
    }

    /// The record field the color rule needs from the source, if any.
    pub fn tag_field(&self) -> Option<&str> {
        self.point_rule.field()
    }
}
