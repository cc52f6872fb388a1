//! Default values for configuration fields.
//!
//! These functions are used by serde for default deserialization.

// ============================================================================
// Common Defaults
// ============================================================================

pub fn r#true() -> bool {
    true
}

pub fn r#false() -> bool {
    false
}

// ============================================================================
// [build] Section Defaults
// ============================================================================

pub mod build {
    use std::path::PathBuf;

    pub fn root() -> Option<PathBuf> {
        None
    }

    pub fn pages() -> PathBuf {
        "src/pages".into()
    }

    pub fn exclude() -> Vec<PathBuf> {
        vec!["archive".into()]
    }

    pub fn layouts() -> PathBuf {
        "src/layouts".into()
    }

    pub fn partials() -> PathBuf {
        "src/partials".into()
    }

    pub fn helpers() -> PathBuf {
        "src/helpers".into()
    }

    pub fn default_layout() -> String {
        "default".into()
    }

    pub fn output() -> PathBuf {
        "dist".into()
    }

    pub fn templates() -> PathBuf {
        "templates".into()
    }

    pub fn template_ext() -> String {
        "tmpl".into()
    }

    pub mod sass {
        use std::path::PathBuf;

        pub fn entry() -> PathBuf {
            "src/assets/scss/app.scss".into()
        }

        pub fn include() -> Vec<PathBuf> {
            vec!["node_modules/foundation-emails/scss".into()]
        }

        pub fn watch() -> Vec<PathBuf> {
            vec!["src/assets/scss".into(), "../scss".into()]
        }

        pub fn output() -> PathBuf {
            "css/app.css".into()
        }

        pub fn command() -> Vec<String> {
            vec![]
        }
    }

    pub mod inline {
        pub fn placeholder() -> String {
            "<!-- <style> -->".into()
        }
    }

    pub mod inky {
        pub fn column_count() -> u32 {
            12
        }
    }
}

// ============================================================================
// [serve] Section Defaults
// ============================================================================

pub mod serve {
    pub fn interface() -> String {
        "127.0.0.1".into()
    }

    pub fn port() -> u16 {
        3000
    }

    pub fn reload_port() -> u16 {
        3001
    }
}

// ============================================================================
// [deploy] Section Defaults
// ============================================================================

pub mod deploy {
    pub fn provider() -> String {
        "sftp".into()
    }

    pub mod sftp {
        use std::path::PathBuf;

        pub fn port() -> u16 {
            22
        }

        pub fn key_path() -> Option<PathBuf> {
            None
        }

        pub fn password_env() -> String {
            "INKPOT_SFTP_PASSWORD".into()
        }

        pub fn passphrase_env() -> String {
            "INKPOT_SFTP_PASSPHRASE".into()
        }
    }
}
