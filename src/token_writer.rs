use std::io;

use crate::atom::Atom;

struct StandardWriter {
    just_started_new_list: bool,
    at_start_of_output: bool,
}

impl StandardWriter {
    fn new() -> StandardWriter {
        StandardWriter {
            just_started_new_list: true,
            at_start_of_output: true,
        }
    }

    fn separate<W: io::Write>(&mut self, mut w: W) -> io::Result<()> {
        if !self.just_started_new_list && !self.at_start_of_output {
            write!(w, " ")?;
        }
        self.at_start_of_output = false;
        Ok(())
    }

    fn start_list<W: io::Write>(&mut self, mut w: W) -> io::Result<()> {
        self.separate(&mut w)?;
        self.just_started_new_list = true;
        write!(w, "(")
    }

    fn write_atom<W: io::Write>(&mut self, mut w: W, atom: Atom) -> io::Result<()> {
        self.separate(&mut w)?;
        self.just_started_new_list = false;
        atom.write(w)
    }

    fn end_list<W: io::Write>(&mut self, mut w: W) -> io::Result<()> {
        self.just_started_new_list = false;
        write!(w, ")")
    }
}

struct MachineWriter {
    need_space_before_next_atom: bool,
}

impl MachineWriter {
    fn new() -> MachineWriter {
        MachineWriter {
            need_space_before_next_atom: false,
        }
    }

    fn start_list<W: io::Write>(&mut self, mut w: W) -> io::Result<()> {
        self.need_space_before_next_atom = false;
        write!(w, "(")
    }

    fn write_atom<W: io::Write>(&mut self, mut w: W, atom: Atom) -> io::Result<()> {
        if self.need_space_before_next_atom {
            write!(w, " ")?;
        }
        self.need_space_before_next_atom = atom.ends_open();
        atom.write(w)
    }

    fn end_list<W: io::Write>(&mut self, mut w: W) -> io::Result<()> {
        self.need_space_before_next_atom = false;
        write!(w, ")")
    }
}

enum Writer {
    Standard(StandardWriter),
    Machine(MachineWriter),
}

pub struct TokenWriter<W> {
    w: W,
    writer: Writer,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Style {
    /// One space between every pair of tokens.
    Standard,
    /// Only the spaces needed to read the output back.
    Machine,
}

impl<W: io::Write> TokenWriter<W> {
    pub fn new(w: W, style: Style) -> TokenWriter<W> {
        let writer = match style {
            Style::Standard => Writer::Standard(StandardWriter::new()),
            Style::Machine => Writer::Machine(MachineWriter::new()),
        };

        TokenWriter { w, writer }
    }

    pub fn start_list(&mut self) -> io::Result<()> {
        match self.writer {
            Writer::Standard(ref mut writer) => writer.start_list(&mut self.w),
            Writer::Machine(ref mut writer) => writer.start_list(&mut self.w),
        }
    }

    pub fn write_atom(&mut self, atom: Atom) -> io::Result<()> {
        match self.writer {
            Writer::Standard(ref mut writer) => writer.write_atom(&mut self.w, atom),
            Writer::Machine(ref mut writer) => writer.write_atom(&mut self.w, atom),
        }
    }

    pub fn end_list(&mut self) -> io::Result<()> {
        match self.writer {
            Writer::Standard(ref mut writer) => writer.end_list(&mut self.w),
            Writer::Machine(ref mut writer) => writer.end_list(&mut self.w),
        }
    }

    pub fn into_inner(self) -> W {
        self.w
    }
}
