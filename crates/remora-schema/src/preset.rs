use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Preset {
    pub name: &'static str,
    pub description: &'static str,
    pub manifest: &'static str,
}

pub const BUILTIN_PRESETS: &[Preset] = &[
    Preset {
        name: "debian-slim",
        description: "Minimal Debian base layer with no build steps",
        manifest: r#"manifest_version = 1

[base]
image = "debian-slim"
"#,
    },
    Preset {
        name: "headless-chromium",
        description: "Debian base with headless Chromium and browser automation tooling",
        manifest: r#"manifest_version = 1

[base]
image = "debian-slim"

[build]
steps = [
    "apt-get install -y software-properties-common",
    "apt-add-repository non-free",
    "apt-add-repository contrib",
    "apt-get update",
    "pip install playwright==1.20.0",
    "playwright install-deps chromium",
    "playwright install chromium",
]
"#,
    },
    Preset {
        name: "python",
        description: "Debian base with a Python toolchain",
        manifest: r#"manifest_version = 1

[base]
image = "debian-slim"

[build]
steps = [
    "apt-get update",
    "apt-get install -y python3 python3-pip python3-venv",
]
"#,
    },
];

pub fn get_preset(name: &str) -> Option<&'static Preset> {
    BUILTIN_PRESETS.iter().find(|p| p.name == name)
}

pub fn list_presets() -> &'static [Preset] {
    BUILTIN_PRESETS
}
