//! TSDL serialization of the trace schema.
//!
//! The metadata artifact is the plain-text form of CTF 1.8 metadata: a `trace`
//! block (version, uuid, byte order, packet header), an `env` block, the
//! `clock`, the `stream` block and one `event` block per event class, in
//! registration order. Rendering is a pure function of the schema, so the same
//! writer always produces the same text.

use std::fmt::{self, Display, Formatter};

use uuid::Uuid;

use crate::ctf::clock::Clock;
use crate::ctf::constants::{CTF_MAJOR, CTF_MINOR, METADATA_SIGNATURE};
use crate::ctf::schema::StreamClass;
use crate::ctf::types::{ByteOrder, FieldDecl, FieldSet, IntegerDecl};

/// A value of the `env` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvValue {
    String(String),
    Integer(i64),
}

impl From<&str> for EnvValue {
    fn from(v: &str) -> Self {
        EnvValue::String(v.to_string())
    }
}

impl From<String> for EnvValue {
    fn from(v: String) -> Self {
        EnvValue::String(v)
    }
}

impl From<i64> for EnvValue {
    fn from(v: i64) -> Self {
        EnvValue::Integer(v)
    }
}

impl From<i32> for EnvValue {
    fn from(v: i32) -> Self {
        EnvValue::Integer(i64::from(v))
    }
}

/// Borrowed view of everything the metadata describes.
pub struct Metadata<'a> {
    pub uuid: &'a Uuid,
    pub byte_order: ByteOrder,
    pub env: &'a [(String, EnvValue)],
    pub clock: &'a Clock,
    pub stream_class: &'a StreamClass,
}

/// Quote a string literal for TSDL.
fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

fn integer_type(int: &IntegerDecl) -> String {
    let mut s = format!(
        "integer {{ size = {}; align = {}; signed = {}; encoding = none; base = {}; byte_order = native;",
        int.width(),
        int.alignment(),
        int.is_signed(),
        int.base().radix()
    );
    if let Some(clock) = int.clock() {
        s.push_str(&format!(" map = clock.{clock}.value;"));
    }
    s.push_str(" }");
    s
}

/// Type specifier and declarator suffix of a field.
fn type_and_suffix(decl: &FieldDecl) -> (String, String) {
    match decl {
        FieldDecl::Integer(int) => (integer_type(int), String::new()),
        FieldDecl::String => ("string { encoding = UTF8; }".to_string(), String::new()),
        FieldDecl::Sequence {
            element,
            length_field,
        } => {
            let (ty, inner) = type_and_suffix(element);
            (ty, format!("[ {length_field} ]{inner}"))
        }
    }
}

fn write_struct(f: &mut Formatter<'_>, indent: &str, set: &FieldSet) -> fmt::Result {
    writeln!(f, "struct {{")?;
    for (name, decl) in set.iter() {
        let (ty, suffix) = type_and_suffix(decl);
        writeln!(f, "{indent}\t{ty} {name}{suffix};")?;
    }
    write!(f, "{indent}}} align({})", set.alignment())
}

impl Display for Metadata<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let u32_type = "integer { size = 32; align = 8; signed = false; encoding = none; base = 10; byte_order = native; }";
        let u8_type = "integer { size = 8; align = 8; signed = false; encoding = none; base = 10; byte_order = native; }";

        writeln!(f, "{METADATA_SIGNATURE}")?;
        writeln!(f)?;

        writeln!(f, "trace {{")?;
        writeln!(f, "\tmajor = {CTF_MAJOR};")?;
        writeln!(f, "\tminor = {CTF_MINOR};")?;
        writeln!(f, "\tuuid = \"{}\";", self.uuid.hyphenated())?;
        writeln!(f, "\tbyte_order = {};", self.byte_order.tsdl())?;
        writeln!(f, "\tpacket.header := struct {{")?;
        writeln!(f, "\t\t{u32_type} magic;")?;
        writeln!(f, "\t\t{u8_type} uuid[16];")?;
        writeln!(f, "\t\t{u32_type} stream_id;")?;
        writeln!(f, "\t}} align(8);")?;
        writeln!(f, "}};")?;
        writeln!(f)?;

        writeln!(f, "env {{")?;
        for (key, value) in self.env {
            match value {
                EnvValue::String(s) => writeln!(f, "\t{key} = {};", quote(s))?,
                EnvValue::Integer(i) => writeln!(f, "\t{key} = {i};")?,
            }
        }
        writeln!(f, "}};")?;
        writeln!(f)?;

        let clock = self.clock;
        writeln!(f, "clock {{")?;
        writeln!(f, "\tname = {};", clock.name())?;
        if let Some(uuid) = clock.uuid() {
            writeln!(f, "\tuuid = \"{}\";", uuid.hyphenated())?;
        }
        if let Some(description) = clock.description() {
            writeln!(f, "\tdescription = {};", quote(description))?;
        }
        writeln!(f, "\tfreq = {};", clock.frequency())?;
        writeln!(f, "\tprecision = {};", clock.precision())?;
        writeln!(f, "\toffset_s = 0;")?;
        writeln!(f, "\toffset = 0;")?;
        writeln!(f, "\tabsolute = FALSE;")?;
        writeln!(f, "}};")?;
        writeln!(f)?;

        let sc = self.stream_class;
        writeln!(f, "stream {{")?;
        writeln!(f, "\tid = {};", sc.id())?;
        write!(f, "\tevent.header := ")?;
        write_struct(f, "\t", sc.event_header())?;
        writeln!(f, ";")?;
        writeln!(f)?;
        write!(f, "\tpacket.context := ")?;
        write_struct(f, "\t", sc.packet_context())?;
        writeln!(f, ";")?;
        if !sc.event_context().is_empty() {
            writeln!(f)?;
            write!(f, "\tevent.context := ")?;
            write_struct(f, "\t", sc.event_context())?;
            writeln!(f, ";")?;
        }
        writeln!(f, "}};")?;

        for class in sc.event_classes() {
            writeln!(f)?;
            writeln!(f, "event {{")?;
            writeln!(f, "\tname = {};", quote(class.name()))?;
            writeln!(f, "\tid = {};", class.id())?;
            writeln!(f, "\tstream_id = {};", sc.id())?;
            write!(f, "\tfields := ")?;
            write_struct(f, "\t", class.payload())?;
            writeln!(f, ";")?;
            writeln!(f, "}};")?;
        }

        Ok(())
    }
}
