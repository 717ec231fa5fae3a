use std::env;
use std::process::ExitCode;

use ctrkit::formats::ncch::NcchReader;

fn main() -> ExitCode {
    let Some(path) = env::args().nth(1) else {
        eprintln!("usage: section_dump <image.3ds|image.cxi>");
        return ExitCode::FAILURE;
    };

    let mut reader = match NcchReader::from_file(&path) {
        Ok(reader) => reader,
        Err(e) => {
            eprintln!("{path}: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = dump(&mut reader) {
        eprintln!("{path}: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn dump(reader: &mut NcchReader<ctrkit::source::FileSource>) -> ctrkit::Result<()> {
    println!("program id:   {:016X}", reader.program_id()?);

    let exheader = reader.exheader()?;
    println!("title:        {}", exheader.title_str());
    println!("entry point:  {:#010x}", exheader.text.address);
    println!("compressed:   {}", exheader.is_code_compressed());

    let code = reader.load_exefs_section(".code")?;
    println!(".code bytes:  {:#x}", code.len());

    match reader.romfs() {
        Ok(romfs) => println!("romfs:        {:#x} bytes at {:#x}", romfs.size(), romfs.offset()),
        Err(ctrkit::Error::NotPresent) => println!("romfs:        none"),
        Err(e) => return Err(e),
    }

    Ok(())
}
