use crate::error::PatternCompileError;
use crate::flags::CompileFlags;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use regex_syntax::ast::{
    self, AssertionKind, Ast, ClassBracketed, ClassSet, ClassSetItem, ClassSetUnion, GroupKind,
    Literal, LiteralKind, Span, Visitor,
};
use regex_syntax::hir::{self, Hir, HirKind, Look};
use regex_syntax::hir::translate::TranslatorBuilder;
use tracing::debug;

/// Extra repetitions allowed for `*`, `+` and `{n,}`.
pub const DEFAULT_MAX_REPEAT: u32 = 10;

/// Largest product of nested counted repetitions, e.g. `(a{10}){100}`.
pub const MAX_REPEAT_COUNT: u32 = 1000;

/// Longest sample, in bytes, a compiled pattern may produce.
pub const MAX_SAMPLE_LEN: usize = 32 * 1024;

/// Produces one string matching a compiled pattern per call.
pub trait Sampler {
    fn sample(&mut self) -> String;
}

/// Compiles a pattern and its flags into a [`Sampler`].
pub trait GenerationCapability: Send + Sync {
    fn compile(
        &self,
        pattern: &str,
        flags: CompileFlags,
    ) -> Result<Box<dyn Sampler>, PatternCompileError>;
}

/// Compiles `pattern` and draws exactly `count` samples, in order.
///
/// Duplicates are kept. Callers never pass an empty pattern or a zero count.
pub fn generate(
    capability: &dyn GenerationCapability,
    pattern: &str,
    flags: CompileFlags,
    count: usize,
) -> Result<Vec<String>, PatternCompileError> {
    let mut sampler = capability.compile(pattern, flags)?;
    debug!(%flags, count, "generating samples");
    let mut results = Vec::with_capacity(count);
    for _ in 0..count {
        results.push(sampler.sample());
    }
    Ok(results)
}

/// Generation capability backed by `regex-syntax` and `rand_regex`.
#[derive(Debug, Clone, Copy)]
pub struct RegexGenerator {
    max_repeat: u32,
    seed: Option<u64>,
}

impl Default for RegexGenerator {
    fn default() -> Self {
        Self {
            max_repeat: DEFAULT_MAX_REPEAT,
            seed: None,
        }
    }
}

impl RegexGenerator {
    pub fn new(max_repeat: u32) -> Self {
        Self {
            max_repeat,
            seed: None,
        }
    }

    /// Every compiled sampler starts from the same RNG state.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn max_repeat(&self) -> u32 {
        self.max_repeat
    }

    fn rng(&self) -> SmallRng {
        match self.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        }
    }
}

impl GenerationCapability for RegexGenerator {
    fn compile(
        &self,
        pattern: &str,
        flags: CompileFlags,
    ) -> Result<Box<dyn Sampler>, PatternCompileError> {
        let hir = strip_anchors(parse_hir(pattern, flags)?)?;
        if !repeat_count_within(&hir, MAX_REPEAT_COUNT) {
            return Err(PatternCompileError::new("invalid repeat count"));
        }
        let longest = longest_sample(&hir, self.max_repeat);
        if longest > MAX_SAMPLE_LEN {
            return Err(PatternCompileError::new(format!(
                "pattern can produce {longest} bytes per sample, limit is {MAX_SAMPLE_LEN}"
            )));
        }
        let regex = rand_regex::Regex::with_hir(hir, self.max_repeat)
            .map_err(|err| PatternCompileError::new(err.to_string()))?;
        if !regex.is_utf8() {
            return Err(PatternCompileError::new(
                "pattern can produce invalid UTF-8",
            ));
        }
        Ok(Box::new(RegexSampler {
            regex,
            rng: self.rng(),
        }))
    }
}

struct RegexSampler {
    regex: rand_regex::Regex,
    rng: SmallRng,
}

impl Sampler for RegexSampler {
    fn sample(&mut self) -> String {
        self.rng.sample(&self.regex)
    }
}

fn parse_hir(pattern: &str, flags: CompileFlags) -> Result<Hir, PatternCompileError> {
    let mut parsed = ast::parse::Parser::new().parse(pattern).map_err(|err| {
        PatternCompileError::new(format!(
            "{} at offset {}",
            err.kind(),
            err.span().start.offset
        ))
    })?;
    if !flags.contains(CompileFlags::PERL_X) {
        ast::visit(&parsed, PerlExtensionCheck)?;
    }
    if !flags.contains(CompileFlags::CLASS_NL) {
        exclude_newline(&mut parsed);
    }
    TranslatorBuilder::new()
        .case_insensitive(flags.contains(CompileFlags::FOLD_CASE))
        .multi_line(!flags.contains(CompileFlags::ONE_LINE))
        .dot_matches_new_line(flags.contains(CompileFlags::DOT_NL))
        .swap_greed(flags.contains(CompileFlags::NON_GREEDY))
        .build()
        .translate(pattern, &parsed)
        .map_err(|err| {
            PatternCompileError::new(format!(
                "{} at offset {}",
                err.kind(),
                err.span().start.offset
            ))
        })
}

/// Line and text anchors generate nothing; word boundaries cannot be honored
/// by sampling and are rejected.
fn strip_anchors(node: Hir) -> Result<Hir, PatternCompileError> {
    Ok(match node.into_kind() {
        HirKind::Look(
            Look::Start
            | Look::End
            | Look::StartLF
            | Look::EndLF
            | Look::StartCRLF
            | Look::EndCRLF,
        ) => Hir::empty(),
        HirKind::Look(look) => {
            return Err(PatternCompileError::new(format!(
                "assertion {look:?} is not supported"
            )));
        }
        HirKind::Empty => Hir::empty(),
        HirKind::Literal(hir::Literal(bytes)) => Hir::literal(bytes),
        HirKind::Class(class) => Hir::class(class),
        HirKind::Repetition(repetition) => Hir::repetition(hir::Repetition {
            min: repetition.min,
            max: repetition.max,
            greedy: repetition.greedy,
            sub: Box::new(strip_anchors(*repetition.sub)?),
        }),
        HirKind::Capture(capture) => strip_anchors(*capture.sub)?,
        HirKind::Concat(subs) => Hir::concat(
            subs.into_iter()
                .map(strip_anchors)
                .collect::<Result<_, _>>()?,
        ),
        HirKind::Alternation(subs) => Hir::alternation(
            subs.into_iter()
                .map(strip_anchors)
                .collect::<Result<_, _>>()?,
        ),
    })
}

/// Counted repetitions may nest only while the product of their upper
/// bounds stays within `budget`. `*` and `+` are not counted.
fn repeat_count_within(node: &Hir, budget: u32) -> bool {
    match node.kind() {
        HirKind::Repetition(repetition) => {
            let count = repetition.max.unwrap_or(repetition.min);
            if count > budget {
                return false;
            }
            let budget = if count > 0 { budget / count } else { budget };
            repeat_count_within(&repetition.sub, budget)
        }
        HirKind::Capture(capture) => repeat_count_within(&capture.sub, budget),
        HirKind::Concat(subs) | HirKind::Alternation(subs) => {
            subs.iter().all(|sub| repeat_count_within(sub, budget))
        }
        _ => true,
    }
}

/// Upper bound on the byte length of one sample, with unbounded
/// repetitions allowed `max_repeat` extra iterations.
fn longest_sample(node: &Hir, max_repeat: u32) -> usize {
    match node.kind() {
        HirKind::Empty | HirKind::Look(_) => 0,
        HirKind::Literal(literal) => literal.0.len(),
        HirKind::Class(class) => class.maximum_len().unwrap_or(0),
        HirKind::Repetition(repetition) => {
            let times = repetition
                .max
                .unwrap_or_else(|| repetition.min.saturating_add(max_repeat));
            longest_sample(&repetition.sub, max_repeat).saturating_mul(times as usize)
        }
        HirKind::Capture(capture) => longest_sample(&capture.sub, max_repeat),
        HirKind::Concat(subs) => subs
            .iter()
            .map(|sub| longest_sample(sub, max_repeat))
            .fold(0, usize::saturating_add),
        HirKind::Alternation(subs) => subs
            .iter()
            .map(|sub| longest_sample(sub, max_repeat))
            .max()
            .unwrap_or(0),
    }
}

/// Rejects constructs that are only available with `perlX`.
struct PerlExtensionCheck;

impl PerlExtensionCheck {
    fn reject(construct: &str) -> PatternCompileError {
        PatternCompileError::new(format!("{construct} require Perl extensions (perlX)"))
    }
}

impl Visitor for PerlExtensionCheck {
    type Output = ();
    type Err = PatternCompileError;

    fn finish(self) -> Result<(), PatternCompileError> {
        Ok(())
    }

    fn visit_pre(&mut self, node: &Ast) -> Result<(), PatternCompileError> {
        let construct = match node {
            Ast::Flags(_) => "inline flags",
            Ast::ClassPerl(_) => "Perl character classes",
            Ast::Assertion(assertion)
                if !matches!(
                    assertion.kind,
                    AssertionKind::StartLine | AssertionKind::EndLine
                ) =>
            {
                "Perl assertions"
            }
            Ast::Repetition(repetition) if !repetition.greedy => "non-greedy repetitions",
            Ast::Group(group) if !matches!(group.kind, GroupKind::CaptureIndex(_)) => {
                "non-capturing and named groups"
            }
            _ => return Ok(()),
        };
        Err(Self::reject(construct))
    }

    fn visit_class_set_item_pre(&mut self, item: &ClassSetItem) -> Result<(), PatternCompileError> {
        match item {
            ClassSetItem::Perl(_) => Err(Self::reject("Perl character classes")),
            _ => Ok(()),
        }
    }
}

/// Adds `\n` to every negated bracket class so the negation excludes it.
fn exclude_newline(node: &mut Ast) {
    match node {
        Ast::ClassBracketed(class) if class.negated => {
            let span = class.span;
            add_newline(&mut class.kind, span);
        }
        Ast::Repetition(repetition) => exclude_newline(&mut repetition.ast),
        Ast::Group(group) => exclude_newline(&mut group.ast),
        Ast::Alternation(alternation) => alternation.asts.iter_mut().for_each(exclude_newline),
        Ast::Concat(concat) => concat.asts.iter_mut().for_each(exclude_newline),
        _ => {}
    }
}

fn add_newline(set: &mut ClassSet, span: Span) {
    let newline = ClassSetItem::Literal(Literal {
        span,
        kind: LiteralKind::Verbatim,
        c: '\n',
    });
    let original = std::mem::replace(set, ClassSet::Item(ClassSetItem::Empty(span)));
    let nested = ClassSetItem::Bracketed(Box::new(ClassBracketed {
        span,
        negated: false,
        kind: original,
    }));
    *set = ClassSet::Item(ClassSetItem::Union(ClassSetUnion {
        span,
        items: vec![nested, newline],
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::RegexBuilder;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn matcher(pattern: &str, flags: CompileFlags) -> regex::Regex {
        RegexBuilder::new(&format!(r"\A(?:{pattern})\z"))
            .case_insensitive(flags.contains(CompileFlags::FOLD_CASE))
            .multi_line(!flags.contains(CompileFlags::ONE_LINE))
            .dot_matches_new_line(flags.contains(CompileFlags::DOT_NL))
            .build()
            .expect("pattern valid for the regex crate")
    }

    fn samples(pattern: &str, flags: CompileFlags, count: usize) -> Vec<String> {
        generate(
            &RegexGenerator::default().with_seed(7),
            pattern,
            flags,
            count,
        )
        .expect("pattern compiles")
    }

    #[test]
    fn alternation_yields_requested_count() {
        let results = samples("a|b", CompileFlags::empty(), 3);
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|s| s == "a" || s == "b"));
    }

    #[test]
    fn samples_rematch_under_their_flags() {
        let cases = [
            ("[a-c]{2,4}", CompileFlags::empty()),
            ("hello", CompileFlags::FOLD_CASE),
            ("x.y", CompileFlags::DOT_NL),
            ("(ab|cd)+e?", CompileFlags::NON_GREEDY),
            (r"\d{3}-\w+", CompileFlags::PERL_X),
            ("(?:q|r)*?s", CompileFlags::PERL_X | CompileFlags::FOLD_CASE),
            ("(ab|cd)+?e", CompileFlags::PERL_X | CompileFlags::NON_GREEDY),
            ("^abc$", CompileFlags::empty()),
            ("^abc$", CompileFlags::ONE_LINE),
            ("^(x|y)+$", CompileFlags::ONE_LINE | CompileFlags::NON_GREEDY),
            ("[^a]{3}", CompileFlags::CLASS_NL),
            (
                "[^a]{3}",
                CompileFlags::CLASS_NL | CompileFlags::DOT_NL | CompileFlags::ONE_LINE,
            ),
            (
                "Hello,? (world|you( (fantastic|wonderful|amazing) (human|person|individual))?)[.!]",
                CompileFlags::empty(),
            ),
        ];
        for (pattern, flags) in cases {
            let re = matcher(pattern, flags);
            let results = samples(pattern, flags, 25);
            assert_eq!(results.len(), 25);
            for sample in &results {
                assert!(re.is_match(sample), "{sample:?} does not match {pattern:?}");
            }
        }
    }

    #[test]
    fn fold_case_varies_letter_case() {
        let results = samples("abcdefgh", CompileFlags::FOLD_CASE, 40);
        assert!(results.iter().any(|s| s != "abcdefgh"));
    }

    #[test]
    fn unbounded_repetition_is_capped() {
        let generator = RegexGenerator::new(4).with_seed(1);
        let results = generate(&generator, "z*", CompileFlags::empty(), 100).unwrap();
        assert!(results.iter().all(|s| s.len() <= 4));
    }

    #[test]
    fn unbalanced_pattern_fails_to_compile() {
        let err = RegexGenerator::default()
            .compile("((", CompileFlags::empty())
            .err()
            .expect("unbalanced pattern rejected");
        assert!(!err.message().is_empty());
    }

    #[test]
    fn perl_extensions_need_the_flag() {
        let err = RegexGenerator::default()
            .compile(r"\bword", CompileFlags::empty())
            .err()
            .expect("word boundary needs perlX");
        assert!(err.message().contains("perlX"));
        for pattern in [r"\d+", "(?:ab)", "a+?", "(?i)abc", r"[\w-]", "(?P<n>x)"] {
            let err = RegexGenerator::default()
                .compile(pattern, CompileFlags::empty())
                .err()
                .unwrap_or_else(|| panic!("{pattern:?} should need perlX"));
            assert!(err.message().contains("perlX"), "{}", err.message());
            assert!(
                RegexGenerator::default()
                    .compile(pattern, CompileFlags::PERL_X)
                    .is_ok(),
                "{pattern:?} should compile with perlX"
            );
        }
    }

    #[test]
    fn negated_class_skips_newline_without_class_nl() {
        let results = samples("[^a]{8}", CompileFlags::empty(), 200);
        assert!(results.iter().all(|s| !s.contains('\n') && !s.contains('a')));
    }

    #[test]
    fn negated_binary_class_skips_newline_without_class_nl() {
        let results = samples("[^a-z&&[^m]]{4}", CompileFlags::empty(), 100);
        assert!(results.iter().all(|s| !s.contains('\n')));
    }

    #[test]
    fn negated_class_reaches_newline_with_class_nl() {
        let pattern = r"[^\x0B-\x{10FFFF}]{20}";
        let with = samples(pattern, CompileFlags::CLASS_NL, 20);
        assert!(with.iter().any(|s| s.contains('\n')));
        let without = samples(pattern, CompileFlags::empty(), 20);
        assert!(without.iter().all(|s| !s.contains('\n')));
    }

    #[test]
    fn anchors_generate_nothing_with_and_without_one_line() {
        for flags in [CompileFlags::empty(), CompileFlags::ONE_LINE] {
            assert_eq!(samples("^abc$", flags, 3), vec!["abc"; 3]);
            assert_eq!(samples("abc$", flags, 2), vec!["abc"; 2]);
            let results = samples("^a|b", flags, 20);
            assert!(results.iter().all(|s| s == "a" || s == "b"), "{results:?}");
        }
        assert_eq!(
            samples(r"\Ax\z", CompileFlags::PERL_X | CompileFlags::ONE_LINE, 2),
            vec!["x"; 2]
        );
    }

    #[test]
    fn word_boundaries_are_rejected_even_with_perl_x() {
        let err = RegexGenerator::default()
            .compile(r"\bword\b", CompileFlags::PERL_X)
            .err()
            .expect("word boundary cannot be sampled");
        assert!(err.message().contains("not supported"), "{}", err.message());
    }

    #[test]
    fn nested_repeat_counts_are_limited() {
        let generator = RegexGenerator::default();
        for pattern in [
            "(a{1000}){1000}",
            "((a{1000}){1000}){1000}",
            "a{1001}",
            "(a{100}){11}",
        ] {
            let err = generator
                .compile(pattern, CompileFlags::empty())
                .err()
                .unwrap_or_else(|| panic!("{pattern:?} should be rejected"));
            assert_eq!(err.message(), "invalid repeat count");
        }
        let results = generate(&generator, "(a{10}){100}", CompileFlags::empty(), 1).unwrap();
        assert_eq!(results[0].len(), 1000);
    }

    #[test]
    fn unbounded_samples_are_limited_by_length() {
        let err = RegexGenerator::new(1000)
            .compile("(x{100})*", CompileFlags::empty())
            .err()
            .expect("sample length over limit");
        assert!(err.message().contains("limit"), "{}", err.message());
        assert!(
            RegexGenerator::default()
                .compile("(x{100})*", CompileFlags::empty())
                .is_ok()
        );
    }

    #[test]
    fn dot_skips_newline_without_dot_nl() {
        let results = samples(".{8}", CompileFlags::empty(), 200);
        assert!(results.iter().all(|s| !s.contains('\n')));
    }

    #[test]
    fn seeded_generators_repeat_themselves() {
        let first = samples("[a-z]{12}", CompileFlags::empty(), 5);
        let second = samples("[a-z]{12}", CompileFlags::empty(), 5);
        assert_eq!(first, second);
    }

    struct CountingCapability {
        calls: Arc<AtomicUsize>,
    }

    struct CountingSampler {
        calls: Arc<AtomicUsize>,
    }

    impl Sampler for CountingSampler {
        fn sample(&mut self) -> String {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            call.to_string()
        }
    }

    impl GenerationCapability for CountingCapability {
        fn compile(
            &self,
            pattern: &str,
            _flags: CompileFlags,
        ) -> Result<Box<dyn Sampler>, PatternCompileError> {
            if pattern == "bad" {
                return Err(PatternCompileError::new("rejected"));
            }
            Ok(Box::new(CountingSampler {
                calls: Arc::clone(&self.calls),
            }))
        }
    }

    #[test]
    fn samples_once_per_requested_result_in_order() {
        let calls = Arc::new(AtomicUsize::new(0));
        let capability = CountingCapability {
            calls: Arc::clone(&calls),
        };
        let results = generate(&capability, "ok", CompileFlags::empty(), 4).unwrap();
        assert_eq!(results, vec!["1", "2", "3", "4"]);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn compile_failure_skips_sampling() {
        let calls = Arc::new(AtomicUsize::new(0));
        let capability = CountingCapability {
            calls: Arc::clone(&calls),
        };
        let err = generate(&capability, "bad", CompileFlags::empty(), 4).unwrap_err();
        assert_eq!(err.message(), "rejected");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
