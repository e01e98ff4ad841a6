use crate::global_variables::*;
use crate::grid::{cell_center_position, Array2, FaceCenteredGrid2};
use colored::*;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;
use std::time::Duration;

pub const DATA_PATH: &'static str = "./data";

pub const PRE_PROCESSING_PATH: &'static str = "./pre_processing";

pub const CASE_SETUP_FILE: &'static str = "case_setup.jou";

pub const POST_PROCESSING_PATH: &'static str = "./post_processing";

pub const PRESSURE_FILE: &'static str = "pressure.dat";

pub const VELOCITY_FILE: &'static str = "velocity.dat";

pub const DIVERGENCE_FILE: &'static str = "divergence.dat";

pub const RESIDUALS_FILE: &'static str = "residuals.dat";

pub const BENCHMARK_FILE: &'static str = "benchmark_elapsed_time.dat";

pub const COMPARISON_FILE: &'static str = "linear_solver_comparison.dat";

#[derive(Clone, Debug, PartialEq)]
pub enum WriteDataMode {
    Frequency(usize),

    ListOfSteps(Vec<usize>),
}

impl WriteDataMode {
    pub fn is_output_step(&self, step: usize) -> bool {
        match self {
            WriteDataMode::Frequency(n) => step == 0 || (*n > 0 && step % n == 0),
            WriteDataMode::ListOfSteps(list) => step == 0 || list.contains(&step),
        }
    }
}

pub fn create_case_directories() -> io::Result<()> {
    let list_of_paths = [DATA_PATH, PRE_PROCESSING_PATH, POST_PROCESSING_PATH];
    for path_str in list_of_paths {
        let path = Path::new(path_str);
        if !path.exists() {
            println!("Creating the {} path.\n", path_str.yellow().bold());
            fs::create_dir_all(path)?;
        } else {
            println!("The {} path already exists.\n", path_str.yellow().bold());
        }
    }
    Ok(())
}

pub fn read_case_setup() -> io::Result<HashMap<String, String>> {
    let path = Path::new(PRE_PROCESSING_PATH).join(CASE_SETUP_FILE);
    let mut file = File::open(path)?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    Ok(extract_parameters(&contents))
}

/// Parses `key = value` lines; `#` starts a comment line.
pub fn extract_parameters(contents: &str) -> HashMap<String, String> {
    contents
        .lines()
        .map(|line| line.trim())
        .filter(|line| !line.starts_with('#'))
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let mut parts = line.splitn(2, '=');
            let key = parts.next()?.trim().to_string();
            let value = parts.next().unwrap_or("").trim().to_string();
            Some((key, value))
        })
        .collect::<HashMap<String, String>>()
}

pub fn write_inside_loop_elapsed_time(
    elapsed_times: &[(&str, Duration)],
    time_step: &usize,
) -> io::Result<()> {
    let path = Path::new(POST_PROCESSING_PATH).join(BENCHMARK_FILE);
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    if *time_step == 0 {
        write!(file, "{:>8}", "step")?;
        for (key, _) in elapsed_times {
            write!(file, " {:>16}", key)?;
        }
        writeln!(file)?;
    }
    write!(file, "{:>8}", time_step)?;
    for (_, value) in elapsed_times {
        write!(file, " {:>16.8e}", value.as_secs_f64())?;
    }
    writeln!(file)?;
    Ok(())
}

/// Writes a cell-centered field as `x y value` rows.
pub fn write_cell_field(
    path: &Path,
    name: &str,
    field: &Array2<Float>,
    origin: [Float; D],
    grid_spacing: [Float; D],
) -> io::Result<()> {
    let mut file = BufWriter::new(File::create(path)?);
    writeln!(file, "{:>16} {:>16} {:>16}", "x", "y", name)?;
    let [nx, ny] = field.size();
    for j in 0..ny {
        for i in 0..nx {
            let [x, y] = cell_center_position(origin, grid_spacing, i, j);
            writeln!(file, "{:>16.8e} {:>16.8e} {:>16.8e}", x, y, field[(i, j)])?;
        }
    }
    file.flush()
}

/// Writes the velocity averaged to cell centers as `x y u v` rows.
pub fn write_velocity_field(path: &Path, velocity: &FaceCenteredGrid2) -> io::Result<()> {
    let mut file = BufWriter::new(File::create(path)?);
    writeln!(file, "{:>16} {:>16} {:>16} {:>16}", "x", "y", "u", "v")?;
    let [nx, ny] = velocity.resolution();
    for j in 0..ny {
        for i in 0..nx {
            let [x, y] = velocity.cell_center_position(i, j);
            let [u, v] = velocity.value_at_cell_center(i, j);
            writeln!(file, "{:>16.8e} {:>16.8e} {:>16.8e} {:>16.8e}", x, y, u, v)?;
        }
    }
    file.flush()
}
