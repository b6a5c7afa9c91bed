use std::process::ExitCode;

use vsm_lib::runner::main_for;
use vsm_lib::VmModule;

fn main() -> ExitCode {
    main_for::<VmModule>()
}
