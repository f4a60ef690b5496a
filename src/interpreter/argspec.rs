//! Argument Specification Registry
//!
//! Backs the `arg` builtin: successive `arg` calls in one script declare
//! positionals, options and flags; `arg --export` matches the script's
//! positional parameters against the declarations and produces environment
//! bindings under UPPERCASE_WITH_UNDERSCORES names. The registry is keyed
//! to the exact context frame that declared it and is destroyed when the
//! export completes.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgType {
    Str,
    Number,
    Boolean,
    /// Bare boolean flag; present means true.
    Flag,
}

impl ArgType {
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "string" => Some(Self::Str),
            "number" => Some(Self::Number),
            "boolean" => Some(Self::Boolean),
            _ => None,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Str => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Flag => "flag",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArgSpec {
    /// Option long name (without dashes); None for positionals.
    pub long: Option<String>,
    pub short: Option<char>,
    pub positional: bool,
    /// Positional name, or the long name for options.
    pub name: String,
    pub ty: ArgType,
    pub required: bool,
    pub default: Option<String>,
    pub description: String,
}

impl ArgSpec {
    /// UPPERCASE_WITH_UNDERSCORES environment name.
    pub fn env_name(&self) -> String {
        self.name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect()
    }
}

/// Outcome of matching argv against the declarations.
#[derive(Debug, Clone)]
pub enum ArgMatch {
    Help,
    Bindings(Vec<(String, String)>),
    Errors(Vec<String>),
}

#[derive(Debug, Clone, Default)]
pub struct ArgSpecSet {
    pub description: Option<String>,
    pub specs: Vec<ArgSpec>,
}

impl ArgSpecSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, spec: ArgSpec) {
        self.specs.push(spec);
    }

    fn find_long(&self, long: &str) -> Option<&ArgSpec> {
        self.specs
            .iter()
            .find(|s| s.long.as_deref() == Some(long))
    }

    fn find_short(&self, short: char) -> Option<&ArgSpec> {
        self.specs.iter().find(|s| s.short == Some(short))
    }

    fn positionals(&self) -> impl Iterator<Item = &ArgSpec> {
        self.specs.iter().filter(|s| s.positional)
    }

    /// Match the script's positional parameters against the declarations.
    pub fn evaluate(&self, argv: &[String]) -> ArgMatch {
        let mut errors: Vec<String> = Vec::new();
        let mut bindings: Vec<(String, String)> = Vec::new();
        let mut positional_values: Vec<String> = Vec::new();

        let mut i = 0;
        while i < argv.len() {
            let arg = &argv[i];
            if arg == "-h" || arg == "--help" {
                return ArgMatch::Help;
            }
            if let Some(rest) = arg.strip_prefix("--") {
                let (long, inline) = match rest.split_once('=') {
                    Some((l, v)) => (l, Some(v.to_string())),
                    None => (rest, None),
                };
                match self.find_long(long) {
                    Some(spec) => {
                        i += 1;
                        self.consume_option(spec, inline, argv, &mut i, &mut bindings, &mut errors);
                    }
                    None => {
                        errors.push(format!("Unknown option: --{}", long));
                        i += 1;
                    }
                }
            } else if arg.len() == 2 && arg.starts_with('-') && arg != "-" {
                let short = arg.chars().nth(1).unwrap();
                match self.find_short(short) {
                    Some(spec) => {
                        i += 1;
                        self.consume_option(spec, None, argv, &mut i, &mut bindings, &mut errors);
                    }
                    None => {
                        errors.push(format!("Unknown option: -{}", short));
                        i += 1;
                    }
                }
            } else {
                positional_values.push(arg.clone());
                i += 1;
            }
        }

        // Positionals in declaration order.
        let mut values = positional_values.into_iter();
        for spec in self.positionals() {
            match values.next() {
                Some(value) => {
                    if let Some(err) = type_error(spec, &value) {
                        errors.push(err);
                    } else {
                        bindings.push((spec.env_name(), value));
                    }
                }
                None => {
                    if let Some(default) = &spec.default {
                        bindings.push((spec.env_name(), default.clone()));
                    } else if spec.required {
                        errors.push(format!("Missing required argument: <{}>", spec.name));
                    }
                }
            }
        }
        for extra in values {
            errors.push(format!("Unexpected argument: {}", extra));
        }

        // Unmatched options fall back to their defaults; flags to false.
        for spec in self.specs.iter().filter(|s| !s.positional) {
            if bindings.iter().any(|(name, _)| *name == spec.env_name()) {
                continue;
            }
            match (&spec.default, spec.ty) {
                (Some(default), _) => bindings.push((spec.env_name(), default.clone())),
                (None, ArgType::Flag) => {
                    bindings.push((spec.env_name(), "false".to_string()))
                }
                (None, _) if spec.required => {
                    errors.push(format!("Missing required option: --{}", spec.name));
                }
                _ => {}
            }
        }

        if errors.is_empty() {
            ArgMatch::Bindings(bindings)
        } else {
            ArgMatch::Errors(errors)
        }
    }

    fn consume_option(
        &self,
        spec: &ArgSpec,
        inline: Option<String>,
        argv: &[String],
        i: &mut usize,
        bindings: &mut Vec<(String, String)>,
        errors: &mut Vec<String>,
    ) {
        if spec.ty == ArgType::Flag {
            bindings.push((spec.env_name(), "true".to_string()));
            return;
        }
        let value = match inline {
            Some(v) => Some(v),
            None => {
                if *i < argv.len() {
                    let v = argv[*i].clone();
                    *i += 1;
                    Some(v)
                } else {
                    None
                }
            }
        };
        match value {
            Some(value) => {
                if let Some(err) = type_error(spec, &value) {
                    errors.push(err);
                } else {
                    bindings.push((spec.env_name(), value));
                }
            }
            None => errors.push(format!("Missing value for option: --{}", spec.name)),
        }
    }

    /// Render the --help text.
    pub fn usage(&self, script: &str) -> String {
        let mut out = String::new();
        out.push_str(&format!("Usage: {}", script));
        for spec in self.positionals() {
            if spec.required {
                out.push_str(&format!(" <{}>", spec.name));
            } else {
                out.push_str(&format!(" [<{}>]", spec.name));
            }
        }
        if self.specs.iter().any(|s| !s.positional) {
            out.push_str(" [options]");
        }
        out.push('\n');
        if let Some(desc) = &self.description {
            out.push('\n');
            out.push_str(desc);
            out.push('\n');
        }

        let positionals: Vec<&ArgSpec> = self.positionals().collect();
        if !positionals.is_empty() {
            out.push_str("\nArguments:\n");
            for spec in positionals {
                let default = spec
                    .default
                    .as_ref()
                    .map(|d| format!(" (default: {})", d))
                    .unwrap_or_default();
                out.push_str(&format!(
                    "  <{}>  {} [{}]{}\n",
                    spec.name,
                    spec.description,
                    spec.ty.label(),
                    default
                ));
            }
        }

        let options: Vec<&ArgSpec> = self.specs.iter().filter(|s| !s.positional).collect();
        out.push_str("\nOptions:\n");
        for spec in options {
            let mut names = String::new();
            if let Some(short) = spec.short {
                names.push_str(&format!("-{}, ", short));
            }
            names.push_str(&format!("--{}", spec.name));
            let default = spec
                .default
                .as_ref()
                .map(|d| format!(" (default: {})", d))
                .unwrap_or_default();
            out.push_str(&format!(
                "  {}  {} [{}]{}\n",
                names,
                spec.description,
                spec.ty.label(),
                default
            ));
        }
        out.push_str("  -h, --help  Show this help\n");
        out
    }
}

fn type_error(spec: &ArgSpec, value: &str) -> Option<String> {
    match spec.ty {
        ArgType::Number => {
            if value.parse::<f64>().is_err() {
                return Some(format!(
                    "Invalid number for {}: {}",
                    display_name(spec),
                    value
                ));
            }
            None
        }
        ArgType::Boolean => {
            if value != "true" && value != "false" {
                return Some(format!(
                    "Invalid boolean for {}: {}",
                    display_name(spec),
                    value
                ));
            }
            None
        }
        _ => None,
    }
}

fn display_name(spec: &ArgSpec) -> String {
    if spec.positional {
        format!("<{}>", spec.name)
    } else {
        format!("--{}", spec.name)
    }
}
