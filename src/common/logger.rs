use csv::Writer;
use plotters::prelude::*;
use std::ffi::OsStr;
use std::fmt;
use std::{collections::HashMap, path::PathBuf};

use super::errors::{EnvError, EnvResult};
use super::eval::EvalResult;

// Sink for episode metrics and evaluation results
pub trait Logger {
    // log a piece of data
    fn log(&mut self, data: LogItem) -> EnvResult<()>;

    // persist everything logged so far
    fn dump(&self) -> EnvResult<()>;

    // check whether logging is possible. if try_to_fix, then
    // the Logger will try to resolve the issue, e.g. by
    // creating the dir
    fn check_can_log(&self, try_to_fix: bool) -> Result<(), &str>;

    fn print_last(&self);
}

#[derive(Debug, Clone, PartialEq)]
pub enum LogData {
    String(String),
    Float(f32),
    Int(i32),
}

impl fmt::Display for LogData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogData::String(s) => write!(f, "{s}"),
            LogData::Float(v) => write!(f, "{v}"),
            LogData::Int(v) => write!(f, "{v}"),
        }
    }
}

impl LogData {
    fn as_f32(&self) -> Option<f32> {
        match self {
            LogData::String(_) => None,
            LogData::Float(v) => Some(*v),
            LogData::Int(v) => Some(*v as f32),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogItem {
    items: HashMap<String, LogData>,
}

impl LogItem {
    pub fn push(mut self, k: String, v: LogData) -> Self {
        self.items.insert(k, v);

        self
    }

    pub fn get(&self, k: &str) -> Option<&LogData> {
        self.items.get(k)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Entries sorted by key.
    pub fn sorted(&self) -> Vec<(&String, &LogData)> {
        let mut entries: Vec<_> = self.items.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }

    pub fn combine(&mut self, other: LogItem) {
        other.items.into_iter().for_each(|(k, v)| {
            self.items.insert(k, v);
        });
    }
}

impl fmt::Display for LogItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .sorted()
            .into_iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        write!(f, "{}", parts.join(" "))
    }
}

impl From<EvalResult> for LogItem {
    fn from(value: EvalResult) -> Self {
        LogItem::default()
            .push(
                "eval_ep_mean_len".to_string(),
                LogData::Float(value.mean_len),
            )
            .push(
                "eval_ep_mean_rew".to_string(),
                LogData::Float(value.mean_reward),
            )
    }
}

/// Emits every item as a `tracing` event and keeps nothing.
#[derive(Debug, Clone, Default)]
pub struct TracingLogger {
    last: Option<LogItem>,
}

impl Logger for TracingLogger {
    fn log(&mut self, data: LogItem) -> EnvResult<()> {
        tracing::info!(target: "rover_gym::metrics", "{}", data);
        self.last = Some(data);

        Ok(())
    }

    fn dump(&self) -> EnvResult<()> {
        Ok(())
    }

    fn check_can_log(&self, _try_to_fix: bool) -> Result<(), &str> {
        Ok(())
    }

    fn print_last(&self) {
        if let Some(log) = &self.last {
            tracing::info!(target: "rover_gym::metrics", "last: {}", log);
        }
    }
}

pub struct CsvLogger {
    overwrite: bool,
    dump_path: PathBuf,
    to_stdout: bool,
    keys: Vec<String>,
    data: Vec<LogItem>,
}

impl CsvLogger {
    pub fn new(dump_path: PathBuf, to_stdout: bool, overwrite: bool) -> Self {
        Self {
            dump_path,
            to_stdout,
            data: Vec::new(),
            keys: Vec::new(),
            overwrite,
        }
    }

    pub fn data(&self) -> &[LogItem] {
        &self.data
    }
}

impl Logger for CsvLogger {
    fn log(&mut self, data: LogItem) -> EnvResult<()> {
        if self.to_stdout {
            println!("{data}");
        }

        if data.is_empty() {
            return Ok(());
        }

        for (key, _) in data.sorted() {
            if !self.keys.contains(key) {
                self.keys.push(key.clone());
            }
        }

        self.data.push(data);

        Ok(())
    }

    fn dump(&self) -> EnvResult<()> {
        tracing::info!(
            "Dumping logs to {:?}. {} items to dump",
            self.dump_path,
            self.data.len()
        );

        let csv_err = |e: csv::Error| EnvError::Metrics(e.to_string());
        let mut wtr = Writer::from_path(&self.dump_path).map_err(csv_err)?;

        // Write the header
        wtr.write_record(&self.keys).map_err(csv_err)?;

        // Write the data
        for record in &self.data {
            let row: Vec<String> = self
                .keys
                .iter()
                .map(|key| record.get(key).map(|v| v.to_string()).unwrap_or_default())
                .collect();
            wtr.write_record(&row).map_err(csv_err)?;
        }

        wtr.flush()?;

        if let Some(dir) = self.dump_path.parent() {
            if let Err(e) = create_plots(&self.data, &self.keys, dir.to_path_buf()) {
                tracing::warn!("could not render metric plots: {e}");
            }
        }

        Ok(())
    }

    fn check_can_log(&self, try_to_fix: bool) -> Result<(), &str> {
        let parent = self.dump_path.parent();
        if self.dump_path.exists() && !self.overwrite {
            Err("logger dump file already exists")
        } else if self.dump_path.extension() != Some(OsStr::new("csv")) {
            Err("logger dump path should be a csv")
        } else if !parent.map(|p| p.exists()).unwrap_or(false) {
            // the parent directory does not exist
            match (try_to_fix, parent) {
                (true, Some(dir)) => match std::fs::create_dir_all(dir) {
                    Ok(_) => Ok(()),
                    Err(_) => Err("Couldn't create directory"),
                },
                _ => Err("logger dump path dir does not exist"),
            }
        } else {
            Ok(())
        }
    }

    fn print_last(&self) {
        println!("Last Log:");
        if let Some(log) = self.data.last() {
            for (key, record) in log.sorted() {
                println!("\t{key}: {record}");
            }
        }
    }
}

/// Renders one line chart per key into `dir/<key>.png`.
pub fn create_plots(
    data: &[LogItem],
    create: &[String],
    dir: PathBuf,
) -> Result<(), Box<dyn std::error::Error>> {
    for yvar in create {
        // bulid output file path
        let mut path = dir.clone();
        path.push(format!("{yvar}.png"));

        // find mins and maxes, and build the data vecs
        let mut ymin = f32::MAX;
        let mut ymax = f32::MIN;
        let mut xmax = 1.0;
        let mut plot_data = Vec::new();
        for (idx, point) in data.iter().enumerate() {
            if let Some(y) = point.get(yvar).and_then(LogData::as_f32) {
                ymin = ymin.min(y);
                ymax = ymax.max(y);
                xmax = (idx as f32).max(1.0);
                plot_data.push((idx as f32, y));
            }
        }

        if plot_data.is_empty() {
            continue;
        }
        if ymax <= ymin.min(0.0) {
            ymax = ymin.min(0.0) + 1.0;
        }

        let root_area = BitMapBackend::new(&path, (600, 400)).into_drawing_area();
        root_area.fill(&WHITE)?;

        let mut ctx = ChartBuilder::on(&root_area)
            .margin(10)
            .build_cartesian_2d(0.0..xmax, ymin.min(0.0)..ymax)?;

        ctx.draw_series(LineSeries::new(plot_data, &GREEN))?;
        root_area.present()?;
    }

    Ok(())
}
