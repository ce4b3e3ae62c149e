use std::env;
use std::process;

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() {
        eprintln!("usage: brseq <file.brseq|file.rseq>...");
        process::exit(2);
    }

    let mut failed = false;
    for arg in &args {
        match brseq::convert(arg) {
            Ok(out) => println!("{} -> {}", arg, out.display()),
            Err(e) => {
                eprintln!("{}: {}", arg, e);
                failed = true;
            }
        }
    }
    if failed {
        process::exit(1);
    }
}
