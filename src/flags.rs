use crate::input::FlagInputs;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Pattern-compilation options handed to a [`GenerationCapability`](crate::GenerationCapability).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CompileFlags(u8);

impl CompileFlags {
    pub const FOLD_CASE: Self = Self(1 << 0);
    pub const CLASS_NL: Self = Self(1 << 1);
    pub const DOT_NL: Self = Self(1 << 2);
    pub const ONE_LINE: Self = Self(1 << 3);
    pub const NON_GREEDY: Self = Self(1 << 4);
    pub const PERL_X: Self = Self(1 << 5);

    const NAMED: [(Self, &'static str); 6] = [
        (Self::FOLD_CASE, "foldCase"),
        (Self::CLASS_NL, "classNL"),
        (Self::DOT_NL, "dotNL"),
        (Self::ONE_LINE, "oneLine"),
        (Self::NON_GREEDY, "nonGreedy"),
        (Self::PERL_X, "perlX"),
    ];

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn set(&mut self, other: Self, enabled: bool) {
        if enabled {
            self.0 |= other.0;
        } else {
            self.0 &= !other.0;
        }
    }
}

impl BitOr for CompileFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for CompileFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl From<&FlagInputs> for CompileFlags {
    fn from(inputs: &FlagInputs) -> Self {
        let mut flags = Self::empty();
        flags.set(Self::FOLD_CASE, inputs.fold_case);
        flags.set(Self::CLASS_NL, inputs.class_nl);
        flags.set(Self::DOT_NL, inputs.dot_nl);
        flags.set(Self::ONE_LINE, inputs.one_line);
        flags.set(Self::NON_GREEDY, inputs.non_greedy);
        flags.set(Self::PERL_X, inputs.perl_x);
        flags
    }
}

impl fmt::Display for CompileFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "none");
        }
        let mut first = true;
        for (flag, name) in Self::NAMED {
            if self.contains(flag) {
                if !first {
                    write!(f, "|")?;
                }
                write!(f, "{name}")?;
                first = false;
            }
        }
        Ok(())
    }
}
