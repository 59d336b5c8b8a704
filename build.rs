//! Build script to generate build-time information

use vergen::EmitBuilder;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Exposes VERGEN_BUILD_DATE to the health endpoint
    EmitBuilder::builder().build_date().emit()?;

    Ok(())
}
