use std::io::{self, Write};

use serde::Serialize;

use crate::domain::Report;

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_report(report: &Report) -> io::Result<()> {
        Self::print_json(report)
    }

    pub fn render<T: Serialize>(value: &T) -> io::Result<String> {
        serde_json::to_string_pretty(value).map_err(io::Error::other)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = Self::render(value)?;
        let mut stdout = io::stdout().lock();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        stdout.flush()
    }
}
