use crate::error::FormDecodeError;
use crate::flags::CompileFlags;
use percent_encoding::percent_decode_str;
use serde::Serialize;
use std::borrow::Cow;

/// Checkbox-style options submitted alongside a pattern.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagInputs {
    pub fold_case: bool,
    #[serde(rename = "classNL")]
    pub class_nl: bool,
    #[serde(rename = "dotNL")]
    pub dot_nl: bool,
    pub one_line: bool,
    pub non_greedy: bool,
    pub perl_x: bool,
}

/// Typed request parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InputModel {
    /// Empty when no pattern was supplied.
    pub pattern: String,
    /// Requested sample count; zero when omitted.
    pub count: i64,
    pub flags: FlagInputs,
}

impl InputModel {
    /// Decodes an `application/x-www-form-urlencoded` query string.
    ///
    /// Unknown keys are ignored and the first occurrence of a repeated key
    /// wins. A non-integer `count` or a value that does not decode to UTF-8
    /// fails the whole request; unrecognised checkbox values read as false.
    pub fn from_query(query: &str) -> Result<Self, FormDecodeError> {
        let mut raw = RawForm::default();
        for pair in query.split('&').filter(|pair| !pair.is_empty()) {
            let (raw_key, raw_value) = pair.split_once('=').unwrap_or((pair, ""));
            let key = decode_component(raw_key)?;
            if let Some(slot) = raw.slot(&key) {
                if slot.is_none() {
                    *slot = Some(decode_component(raw_value)?);
                }
            }
        }
        raw.into_model()
    }

    pub fn compile_flags(&self) -> CompileFlags {
        CompileFlags::from(&self.flags)
    }
}

#[derive(Default)]
struct RawForm {
    pattern: Option<String>,
    count: Option<String>,
    fold_case: Option<String>,
    class_nl: Option<String>,
    dot_nl: Option<String>,
    one_line: Option<String>,
    non_greedy: Option<String>,
    perl_x: Option<String>,
}

impl RawForm {
    fn slot(&mut self, key: &str) -> Option<&mut Option<String>> {
        let slot = match key.to_ascii_lowercase().as_str() {
            "pattern" | "regex" => &mut self.pattern,
            "count" => &mut self.count,
            "foldcase" => &mut self.fold_case,
            "classnl" => &mut self.class_nl,
            "dotnl" => &mut self.dot_nl,
            "oneline" => &mut self.one_line,
            "nongreedy" => &mut self.non_greedy,
            "perlx" => &mut self.perl_x,
            _ => return None,
        };
        Some(slot)
    }

    fn into_model(self) -> Result<InputModel, FormDecodeError> {
        let count = match self.count.as_deref().map(str::trim) {
            None | Some("") => 0,
            Some(value) => value.parse::<i64>().map_err(|_| {
                FormDecodeError::new(format!("field `count` is not an integer: {value:?}"))
            })?,
        };
        Ok(InputModel {
            pattern: self.pattern.unwrap_or_default(),
            count,
            flags: FlagInputs {
                fold_case: checkbox(self.fold_case.as_deref()),
                class_nl: checkbox(self.class_nl.as_deref()),
                dot_nl: checkbox(self.dot_nl.as_deref()),
                one_line: checkbox(self.one_line.as_deref()),
                non_greedy: checkbox(self.non_greedy.as_deref()),
                perl_x: checkbox(self.perl_x.as_deref()),
            },
        })
    }
}

fn decode_component(raw: &str) -> Result<String, FormDecodeError> {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced)
        .decode_utf8()
        .map(Cow::into_owned)
        .map_err(|err| FormDecodeError::new(format!("{raw:?} does not decode to UTF-8: {err}")))
}

fn checkbox(value: Option<&str>) -> bool {
    let Some(value) = value else {
        return false;
    };
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "on" | "true" | "1" | "t" | "yes" | "checked"
    )
}
