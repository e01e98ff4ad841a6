use super::{CaseSetup, ComparisonResult, Simulation};
use crate::error::PressureError;
use crate::io::{
    create_case_directories, read_case_setup, write_cell_field, write_velocity_field,
    CASE_SETUP_FILE, COMPARISON_FILE, DATA_PATH, DIVERGENCE_FILE, POST_PROCESSING_PATH,
    PRE_PROCESSING_PATH, PRESSURE_FILE, RESIDUALS_FILE, VELOCITY_FILE,
};
use crate::post::PostResult;
use crate::Residuals;
use colored::*;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

impl Simulation {
    /// Reads `pre_processing/case_setup.jou` when present, defaults otherwise.
    pub fn build_case_setup() -> Result<Simulation, PressureError> {
        create_case_directories()?;
        let case_setup_path = Path::new(PRE_PROCESSING_PATH).join(CASE_SETUP_FILE);
        let setup = if case_setup_path.exists() {
            println!(
                "Reading the case setup file: {}.\n",
                case_setup_path.display().to_string().yellow().bold()
            );
            CaseSetup::from_setup(read_case_setup()?)?
        } else {
            CaseSetup::new()
        };
        Ok(Simulation::new(setup))
    }
}

impl Simulation {
    pub fn print_residuals(&self, residuals: &Residuals) {
        if self.time_step % 100 == 0 {
            let duration = self.simulation_time.elapsed().as_secs_f64();
            println!("\n{} {:.2} s.", "Elapsed time:".cyan().bold(), duration);
            println!(
                "\n{:>8} {:>12} {:>16} {:>16} {:>16}\n",
                "step".cyan().bold(),
                "iterations".cyan().bold(),
                "linear_solver".cyan().bold(),
                "div_before".cyan().bold(),
                "div_after".cyan().bold()
            );
        }
        println!(
            "{:>8} {:>12} {:>16.8e} {:>16.8e} {:>16.8e}",
            self.time_step,
            residuals.number_of_iterations,
            residuals.linear_solver,
            residuals.divergence_before,
            residuals.divergence_after
        );
    }

    pub fn write_residuals(&self, residuals: &Residuals) -> io::Result<()> {
        let path = Path::new(DATA_PATH).join(RESIDUALS_FILE);
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        if self.time_step == 0 {
            writeln!(
                file,
                "{:>8} {:>12} {:>16} {:>16} {:>16}",
                "step", "iterations", "linear_solver", "div_before", "div_after"
            )?;
        }
        writeln!(
            file,
            "{:>8} {:>12} {:>16.8e} {:>16.8e} {:>16.8e}",
            self.time_step,
            residuals.number_of_iterations,
            residuals.linear_solver,
            residuals.divergence_before,
            residuals.divergence_after
        )?;
        Ok(())
    }

    pub fn write_post_processing_from_each_n_steps<F>(
        &self,
        n: usize,
        function: F,
        file_name: &str,
    ) -> io::Result<()>
    where
        F: Fn(&Simulation) -> Vec<PostResult>,
    {
        if self.time_step % n == 0 {
            let post_results = &function(self);
            let path = Path::new(POST_PROCESSING_PATH).join(file_name);
            let mut file = OpenOptions::new().create(true).append(true).open(path)?;
            if self.time_step == 0 {
                write!(file, "{:>8}", "step")?;
                for post_result in post_results {
                    write!(file, " {:>16}", post_result.name)?;
                }
                writeln!(file)?;
            }
            write!(file, "{:>8}", self.time_step)?;
            for post_result in post_results {
                write!(file, " {:>16.8e}", post_result.value)?;
            }
            writeln!(file)?;
        }
        Ok(())
    }

    pub fn write_data(&self) -> io::Result<()> {
        if self.setup.write_data_mode.is_output_step(self.time_step) {
            println!();
            self.write_data_from_steps()?;
        }
        Ok(())
    }

    /// Velocity, pressure and divergence of the current step under
    /// `data/<step>/`.
    pub fn write_data_from_steps(&self) -> io::Result<()> {
        let step_path = Path::new(DATA_PATH).join(self.time_step.to_string());
        fs::create_dir_all(&step_path)?;
        println!(
            "Writing the step {} data to {}.",
            self.time_step,
            step_path.display().to_string().yellow().bold()
        );
        let origin = self.velocity.origin();
        let grid_spacing = self.velocity.grid_spacing();
        write_velocity_field(&step_path.join(VELOCITY_FILE), &self.velocity)?;
        write_cell_field(
            &step_path.join(PRESSURE_FILE),
            "pressure",
            self.pressure_solver.pressure(),
            origin,
            grid_spacing,
        )?;
        write_cell_field(
            &step_path.join(DIVERGENCE_FILE),
            "divergence",
            &self.velocity.divergence(),
            origin,
            grid_spacing,
        )?;
        Ok(())
    }
}

pub fn write_comparison(results: &[ComparisonResult]) -> io::Result<()> {
    let path = Path::new(POST_PROCESSING_PATH).join(COMPARISON_FILE);
    let mut file = File::create(path)?;
    writeln!(
        file,
        "{:>24} {:>10} {:>12} {:>16} {:>16} {:>16}",
        "linear_solver", "converged", "iterations", "residual", "max_divergence", "time"
    )?;
    for result in results {
        writeln!(
            file,
            "{:>24} {:>10} {:>12} {:>16.8e} {:>16.8e} {:>16.8e}",
            result.linear_solver.to_string(),
            result.report.converged,
            result.report.number_of_iterations,
            result.report.residual,
            result.divergence_after,
            result.elapsed_time
        )?;
    }
    Ok(())
}
