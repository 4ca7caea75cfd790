//! Solc standard-JSON input and output types.
//!
//! See <https://docs.soliditylang.org/en/latest/using-the-compiler.html#compiler-input-and-output-json-description>.

use crate::remappings::Remapping;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, str::FromStr};
use yansi::{Color, Paint, Style};

/// The EVM versions solc can compile for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EvmVersion {
    Homestead,
    TangerineWhistle,
    SpuriousDragon,
    Byzantium,
    Constantinople,
    Petersburg,
    Istanbul,
    Berlin,
    London,
    Paris,
    Shanghai,
    Cancun,
}

impl EvmVersion {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Homestead => "homestead",
            Self::TangerineWhistle => "tangerineWhistle",
            Self::SpuriousDragon => "spuriousDragon",
            Self::Byzantium => "byzantium",
            Self::Constantinople => "constantinople",
            Self::Petersburg => "petersburg",
            Self::Istanbul => "istanbul",
            Self::Berlin => "berlin",
            Self::London => "london",
            Self::Paris => "paris",
            Self::Shanghai => "shanghai",
            Self::Cancun => "cancun",
        }
    }
}

impl fmt::Display for EvmVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The output kinds that can be requested from the compiler.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OutputKind {
    /// Everything, including the AST
    All,
    /// The AST of every source unit
    Ast,
    Abi,
    Metadata,
    Userdoc,
    Devdoc,
    Ir,
    StorageLayout,
    EvmBytecode,
    EvmDeployedBytecode,
    EvmMethodIdentifiers,
    EvmGasEstimates,
}

impl OutputKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::All => "*",
            Self::Ast => "ast",
            Self::Abi => "abi",
            Self::Metadata => "metadata",
            Self::Userdoc => "userdoc",
            Self::Devdoc => "devdoc",
            Self::Ir => "ir",
            Self::StorageLayout => "storageLayout",
            Self::EvmBytecode => "evm.bytecode",
            Self::EvmDeployedBytecode => "evm.deployedBytecode",
            Self::EvmMethodIdentifiers => "evm.methodIdentifiers",
            Self::EvmGasEstimates => "evm.gasEstimates",
        }
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `settings` section of the compiler input.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remappings: Vec<Remapping>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evm_version: Option<EvmVersion>,
    /// Which outputs to generate, `{ file pattern -> { contract pattern -> [kinds] } }`.
    ///
    /// The empty contract pattern selects per-source-unit outputs, i.e. the AST.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub output_selection: BTreeMap<String, BTreeMap<String, Vec<String>>>,
}

impl Settings {
    /// Creates the settings for a build requesting the given output kinds for all files.
    pub fn new(
        remappings: Vec<Remapping>,
        evm_version: Option<EvmVersion>,
        output_kinds: &[OutputKind],
    ) -> Self {
        let mut selection = BTreeMap::new();
        if output_kinds.contains(&OutputKind::All) {
            selection.insert(String::new(), vec![OutputKind::Ast.to_string()]);
            selection.insert("*".to_string(), vec![OutputKind::All.to_string()]);
        } else {
            if output_kinds.contains(&OutputKind::Ast) {
                selection.insert(String::new(), vec![OutputKind::Ast.to_string()]);
            }
            selection.insert(
                "*".to_string(),
                output_kinds
                    .iter()
                    .filter(|kind| **kind != OutputKind::Ast)
                    .map(|kind| kind.to_string())
                    .collect(),
            );
        }
        Self {
            remappings,
            evm_version,
            output_selection: BTreeMap::from([("*".to_string(), selection)]),
        }
    }
}

/// A single source of the compiler input, either pointed at via `urls` or inlined as `content`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urls: Option<Vec<String>>,
}

impl InputSource {
    pub fn content(content: impl Into<String>) -> Self {
        Self { content: Some(content.into()), urls: None }
    }

    pub fn url(url: impl Into<String>) -> Self {
        Self { content: None, urls: Some(vec![url.into()]) }
    }
}

/// The standard-JSON document sent to the compiler on stdin.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SolcInput {
    pub language: String,
    pub sources: BTreeMap<String, InputSource>,
    pub settings: Settings,
}

impl SolcInput {
    pub fn new(sources: BTreeMap<String, InputSource>, settings: Settings) -> Self {
        Self { language: "Solidity".to_string(), sources, settings }
    }
}

/// The standard-JSON document the compiler replies with on stdout.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SolcOutput {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<Error>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub sources: BTreeMap<String, SourceFile>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub contracts: BTreeMap<String, BTreeMap<String, Contract>>,
}

impl SolcOutput {
    /// Whether the output contains at least one item of severity `error`.
    pub fn has_error(&self) -> bool {
        self.errors.iter().any(|err| err.severity.is_error())
    }
}

/// Per-source-unit output, the AST.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SourceFile {
    pub id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ast: Option<serde_json::Value>,
}

/// Per-contract output.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abi: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub userdoc: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub devdoc: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_layout: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evm: Option<Evm>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ewasm: Option<serde_json::Value>,
}

/// The EVM related outputs of a contract.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evm {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assembly: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legacy_assembly: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytecode: Option<Bytecode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployed_bytecode: Option<Bytecode>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub method_identifiers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_estimates: Option<serde_json::Value>,
}

/// A contract's (deployed) bytecode and its metadata.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bytecode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opcodes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_map: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_debug_data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_sources: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_references: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub immutable_references: Option<serde_json::Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq, Hash)]
pub struct SourceLocation {
    pub file: String,
    pub start: i32,
    pub end: i32,
}

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq, Hash)]
pub struct SecondarySourceLocation {
    pub file: Option<String>,
    pub start: Option<i32>,
    pub end: Option<i32>,
    pub message: Option<String>,
}

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Error,
    Warning,
    Info,
}

impl Severity {
    /// Returns `true` if the severity is `Error`.
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error)
    }

    /// Returns `true` if the severity is `Warning`.
    pub const fn is_warning(&self) -> bool {
        matches!(self, Self::Warning)
    }

    /// Returns the string representation of the severity.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "Error",
            Self::Warning => "Warning",
            Self::Info => "Info",
        }
    }

    /// Returns the color to format the severity with.
    pub const fn color(&self) -> Color {
        match self {
            Self::Error => Color::Red,
            Self::Warning => Color::Yellow,
            Self::Info => Color::White,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Error" | "error" => Ok(Self::Error),
            "Warning" | "warning" => Ok(Self::Warning),
            "Info" | "info" => Ok(Self::Info),
            s => Err(format!("Invalid severity: {s}")),
        }
    }
}

/// A diagnostic item reported by the compiler.
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct Error {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_location: Option<SourceLocation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secondary_source_locations: Vec<SecondarySourceLocation>,
    pub r#type: String,
    pub component: String,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatted_message: Option<String>,
}

impl Error {
    /// Returns `true` if the error is an error.
    pub const fn is_error(&self) -> bool {
        self.severity.is_error()
    }

    /// Returns `true` if the error is a warning.
    pub const fn is_warning(&self) -> bool {
        self.severity.is_warning()
    }

    fn fmt_severity(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.severity.as_str())?;
        if let Some(code) = &self.error_code {
            write!(f, " ({code})")?;
        }
        Ok(())
    }
}

/// Tries to mimic solidity's own error formatting, severity and source frames colored.
impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !Paint::is_enabled() {
            let msg = self.formatted_message.as_deref().unwrap_or(&self.message);
            self.fmt_severity(f)?;
            f.write_str(": ")?;
            return f.write_str(msg);
        }

        // Error (XXXX): Error Message
        styled(f, self.severity.color().style().bold(), |f| self.fmt_severity(f))?;
        styled(f, Color::White.style().bold(), |f| {
            f.write_str(": ")?;
            f.write_str(self.message.trim_start())
        })?;

        if let Some(msg) = &self.formatted_message {
            let mut lines = msg.lines();
            // the first line repeats the message written above
            lines.next();

            for line in lines {
                f.write_str("\n")?;
                // color the `--> file:line:col` arrow and the `|` frames of the source snippet
                if let Some((left, loc)) = line.split_once("-->") {
                    f.write_str(left)?;
                    styled(f, Color::Blue.style(), |f| f.write_str("-->"))?;
                    f.write_str(loc)?;
                } else if let Some((frame, rest)) = line.split_once('|') {
                    if frame.chars().all(|c| c.is_whitespace() || c.is_numeric()) {
                        styled(f, Color::Blue.style(), |f| {
                            f.write_str(frame)?;
                            f.write_str("|")
                        })?;
                        f.write_str(rest)?;
                    } else {
                        f.write_str(line)?;
                    }
                } else {
                    f.write_str(line)?;
                }
            }
        }

        Ok(())
    }
}

/// Calls `fun` in between [`Style::fmt_prefix`] and [`Style::fmt_suffix`].
fn styled<F>(f: &mut fmt::Formatter<'_>, style: Style, fun: F) -> fmt::Result
where
    F: FnOnce(&mut fmt::Formatter<'_>) -> fmt::Result,
{
    style.fmt_prefix(f)?;
    fun(f)?;
    style.fmt_suffix(f)
}
