use std::fmt::Write;

/// Width of the banner rule at the top of each header.
const BANNER_WIDTH: usize = 80;

/// Attribution carried between the two rules of every banner.
const ATTRIBUTION: &str = "// Copyright (c) 2024 Philip Turner. See MIT LICENSE";

/// Utility to build a Metal header out of named sections.
///
/// The header name doubles as the include guard, so
/// `metal_simdgroup_event` is wrapped in `__METAL_SIMDGROUP_EVENT`.
#[derive(Debug, Default)]
pub struct HeaderBuilder {
    name: String,
    sections: Vec<(String, String)>,
}

impl HeaderBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add_section(&mut self, name: impl AsRef<str>) -> Section<'_> {
        self.sections.push((name.as_ref().to_string(), String::new()));
        let (_, source) = self.sections.last_mut().unwrap();
        Section { s: source }
    }

    pub fn section(&mut self, name: impl AsRef<str>) -> Section<'_> {
        let source = self
            .sections
            .iter_mut()
            .find(|(sec, _)| sec == name.as_ref())
            .expect("missing section");
        Section { s: &mut source.1 }
    }

    fn guard(&self) -> String {
        format!("__{}", self.name.to_uppercase())
    }

    fn banner(&self) -> String {
        let title = format!("//===-- {} ", self.name);
        let dashes = BANNER_WIDTH.saturating_sub(title.len() + "===//".len());
        let rule = format!("//==={}===//", "-".repeat(BANNER_WIDTH - 10));
        format!(
            "// -*- Metal -*-\n{title}{}===//\n{ATTRIBUTION}\n{rule}\n",
            "-".repeat(dashes)
        )
    }

    pub fn build_source(&self) -> String {
        let guard = self.guard();
        let mut s = self.banner();
        writeln!(s).unwrap();
        writeln!(s, "#ifndef {guard}").unwrap();
        writeln!(s, "#define {guard}").unwrap();
        writeln!(s).unwrap();
        for (_, section) in &self.sections {
            s.push_str(section);
            s.push('\n');
        }
        writeln!(s, "#endif // {guard}").unwrap();
        s
    }
}

pub struct Section<'a> {
    s: &'a mut String,
}

impl Section<'_> {
    pub fn emit(&mut self, source: impl AsRef<str>) -> &mut Self {
        self.s.push_str(source.as_ref());
        self
    }

    /// Emits `source` with every non-empty line shifted right by `spaces`.
    pub fn emit_indented(&mut self, source: impl AsRef<str>, spaces: usize) -> &mut Self {
        self.s.push_str(&indent(source.as_ref(), spaces));
        self
    }
}

/// Shifts every non-empty line of `source` right by `spaces`.
pub fn indent(source: &str, spaces: usize) -> String {
    let padding = " ".repeat(spaces);
    let mut s = String::with_capacity(source.len());
    for line in source.split_inclusive('\n') {
        if !line.trim().is_empty() {
            s.push_str(&padding);
        }
        s.push_str(line);
    }
    s
}

/// One line inside a generated block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    /// A statement, printed with a trailing `;`.
    Statement(String),
    /// Visual separator, printed as whitespace only.
    Blank,
}

/// Statement list making up one branch of a generated function body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Block {
    lines: Vec<Line>,
}

impl Block {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a statement. Fragments made only of whitespace
    /// become blank lines.
    pub fn push(&mut self, fragment: impl Into<String>) -> &mut Self {
        let fragment = fragment.into();
        if fragment.trim().is_empty() {
            self.lines.push(Line::Blank);
        } else {
            self.lines.push(Line::Statement(fragment));
        }
        self
    }

    pub fn blank(&mut self) -> &mut Self {
        self.lines.push(Line::Blank);
        self
    }

    #[cfg(test)]
    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    #[cfg(test)]
    pub fn statements(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().filter_map(|line| match line {
            Line::Statement(s) => Some(s.as_str()),
            Line::Blank => None,
        })
    }

    /// Renders the block one level (two spaces) deeper than `prefix`.
    pub fn render(&self, prefix: &str) -> String {
        let mut s = String::new();
        for line in &self.lines {
            match line {
                Line::Statement(statement) => writeln!(s, "{prefix}  {statement};").unwrap(),
                Line::Blank => writeln!(s, "{prefix}  ").unwrap(),
            }
        }
        s
    }
}
