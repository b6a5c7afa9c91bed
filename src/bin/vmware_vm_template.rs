use std::process::ExitCode;

use vsm_lib::runner::main_for;
use vsm_lib::TemplateModule;

fn main() -> ExitCode {
    main_for::<TemplateModule>()
}
