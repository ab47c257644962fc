use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Color keys every palette carries, in the order CSS variables are emitted.
pub const COLOR_TOKEN_KEYS: [&str; 8] = [
    "background",
    "foreground",
    "primary",
    "secondary",
    "accent",
    "muted",
    "mutedForeground",
    "border",
];

const THEME_PREFIX: &str = "$theme.";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    #[default]
    Dark,
    Light,
}

impl ColorMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColorMode::Dark => "dark",
            ColorMode::Light => "light",
        }
    }
}

/// A complete palette for one color mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorTokens {
    pub background: String,
    pub foreground: String,
    pub primary: String,
    pub secondary: String,
    pub accent: String,
    pub muted: String,
    pub muted_foreground: String,
    pub border: String,
}

impl ColorTokens {
    pub fn dark() -> Self {
        Self {
            background: "#09090b".to_string(),
            foreground: "#fafafa".to_string(),
            primary: "#fafafa".to_string(),
            secondary: "#27272a".to_string(),
            accent: "#27272a".to_string(),
            muted: "#27272a".to_string(),
            muted_foreground: "#a1a1aa".to_string(),
            border: "#27272a".to_string(),
        }
    }

    pub fn light() -> Self {
        Self {
            background: "#ffffff".to_string(),
            foreground: "#09090b".to_string(),
            primary: "#18181b".to_string(),
            secondary: "#f4f4f5".to_string(),
            accent: "#f4f4f5".to_string(),
            muted: "#f4f4f5".to_string(),
            muted_foreground: "#71717a".to_string(),
            border: "#e4e4e7".to_string(),
        }
    }

    /// Look up a color by its camelCase token key.
    pub fn get(&self, key: &str) -> Option<&str> {
        let value = match key {
            "background" => &self.background,
            "foreground" => &self.foreground,
            "primary" => &self.primary,
            "secondary" => &self.secondary,
            "accent" => &self.accent,
            "muted" => &self.muted,
            "mutedForeground" => &self.muted_foreground,
            "border" => &self.border,
            _ => return None,
        };
        Some(value.as_str())
    }

    fn merged(&self, patch: &ColorOverride) -> Self {
        Self {
            background: pick(&patch.background, &self.background),
            foreground: pick(&patch.foreground, &self.foreground),
            primary: pick(&patch.primary, &self.primary),
            secondary: pick(&patch.secondary, &self.secondary),
            accent: pick(&patch.accent, &self.accent),
            muted: pick(&patch.muted, &self.muted),
            muted_foreground: pick(&patch.muted_foreground, &self.muted_foreground),
            border: pick(&patch.border, &self.border),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShadowScale {
    pub sm: String,
    pub md: String,
    pub lg: String,
    pub xl: String,
    #[serde(rename = "2xl")]
    pub xxl: String,
}

impl ShadowScale {
    pub fn get(&self, size: &str) -> Option<&str> {
        let value = match size {
            "sm" => &self.sm,
            "md" => &self.md,
            "lg" => &self.lg,
            "xl" => &self.xl,
            "2xl" => &self.xxl,
            _ => return None,
        };
        Some(value.as_str())
    }
}

impl Default for ShadowScale {
    fn default() -> Self {
        Self {
            sm: "0 1px 2px 0 rgb(0 0 0 / 0.05)".to_string(),
            md: "0 4px 6px -1px rgb(0 0 0 / 0.1), 0 2px 4px -2px rgb(0 0 0 / 0.1)".to_string(),
            lg: "0 10px 15px -3px rgb(0 0 0 / 0.1), 0 4px 6px -4px rgb(0 0 0 / 0.1)".to_string(),
            xl: "0 20px 25px -5px rgb(0 0 0 / 0.1), 0 8px 10px -6px rgb(0 0 0 / 0.1)".to_string(),
            xxl: "0 25px 50px -12px rgb(0 0 0 / 0.25)".to_string(),
        }
    }
}

/// Fully populated design tokens. Every leaf may assume every token is present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeTokens {
    pub mode: ColorMode,
    pub dark: ColorTokens,
    pub light: ColorTokens,
    pub radius: String,
    pub border_width: String,
    pub shadow: ShadowScale,
}

impl Default for ThemeTokens {
    fn default() -> Self {
        Self {
            mode: ColorMode::Dark,
            dark: ColorTokens::dark(),
            light: ColorTokens::light(),
            radius: "0.5rem".to_string(),
            border_width: "1px".to_string(),
            shadow: ShadowScale::default(),
        }
    }
}

impl ThemeTokens {
    /// Palette for the active color mode.
    pub fn palette(&self) -> &ColorTokens {
        match self.mode {
            ColorMode::Dark => &self.dark,
            ColorMode::Light => &self.light,
        }
    }

    /// Resolve a theme reference such as `$theme.colors.primary`.
    ///
    /// `colors.*` reads the active palette, `dark.*` and `light.*` read a
    /// specific one. `radius`, `borderWidth`, `mode` and `shadow.<size>`
    /// are also addressable.
    pub fn resolve(&self, reference: &str) -> Option<String> {
        let path = reference.strip_prefix(THEME_PREFIX)?;
        let parts: Vec<&str> = path.split('.').collect();

        match parts.as_slice() {
            ["colors", key] => self.palette().get(key).map(str::to_string),
            ["dark", key] => self.dark.get(key).map(str::to_string),
            ["light", key] => self.light.get(key).map(str::to_string),
            ["shadow", size] => self.shadow.get(size).map(str::to_string),
            ["radius"] => Some(self.radius.clone()),
            ["borderWidth"] => Some(self.border_width.clone()),
            ["mode"] => Some(self.mode.as_str().to_string()),
            _ => None,
        }
    }

    pub fn is_theme_reference(value: &str) -> bool {
        value.starts_with(THEME_PREFIX)
    }

    /// Token-level merge: fields present in `patch` win, everything else is inherited.
    pub fn merged(&self, patch: &ThemeOverride) -> Self {
        Self {
            mode: patch.mode.unwrap_or(self.mode),
            dark: match &patch.dark {
                Some(colors) => self.dark.merged(colors),
                None => self.dark.clone(),
            },
            light: match &patch.light {
                Some(colors) => self.light.merged(colors),
                None => self.light.clone(),
            },
            radius: pick(&patch.radius, &self.radius),
            border_width: pick(&patch.border_width, &self.border_width),
            shadow: match &patch.shadow {
                Some(shadow) => ShadowScale {
                    sm: pick(&shadow.sm, &self.shadow.sm),
                    md: pick(&shadow.md, &self.shadow.md),
                    lg: pick(&shadow.lg, &self.shadow.lg),
                    xl: pick(&shadow.xl, &self.shadow.xl),
                    xxl: pick(&shadow.xxl, &self.shadow.xxl),
                },
                None => self.shadow.clone(),
            },
        }
    }

    /// CSS custom properties for the active palette, suitable for a `:root` block.
    pub fn css_variables(&self) -> String {
        let palette = self.palette();
        let mut css = String::new();
        for key in COLOR_TOKEN_KEYS {
            if let Some(value) = palette.get(key) {
                let _ = write!(css, "--sdui-{}: {};", kebab_case(key), value);
            }
        }
        let _ = write!(css, "--sdui-radius: {};", self.radius);
        let _ = write!(css, "--sdui-border-width: {};", self.border_width);
        for size in ["sm", "md", "lg", "xl", "2xl"] {
            if let Some(value) = self.shadow.get(size) {
                let _ = write!(css, "--sdui-shadow-{}: {};", size, value);
            }
        }
        css
    }
}

/// A partial palette; absent keys inherit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreground: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub muted: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub muted_foreground: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShadowOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xl: Option<String>,
    #[serde(default, rename = "2xl", skip_serializing_if = "Option::is_none")]
    pub xxl: Option<String>,
}

/// Theme as written in a document or on a node: every field optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<ColorMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dark: Option<ColorOverride>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub light: Option<ColorOverride>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border_width: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shadow: Option<ShadowOverride>,
}

impl ThemeOverride {
    pub fn is_empty(&self) -> bool {
        self == &ThemeOverride::default()
    }
}

/// Theme for a subtree: the parent's tokens with `patch` merged over them.
pub fn derive_theme(parent: &ThemeTokens, patch: Option<&ThemeOverride>) -> ThemeTokens {
    match patch {
        Some(patch) => parent.merged(patch),
        None => parent.clone(),
    }
}

fn pick(patch: &Option<String>, inherited: &str) -> String {
    patch.clone().unwrap_or_else(|| inherited.to_string())
}

pub(crate) fn kebab_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for ch in key.chars() {
        if ch.is_ascii_uppercase() {
            out.push('-');
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}
