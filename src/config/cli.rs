use std::{ffi::OsString, path::PathBuf};

use clap::Parser;

/// Аргументы командной строки, которые понимает фасад.
#[derive(Debug, Clone, Default, PartialEq, Eq, Parser)]
#[command(name = "amino", about = "Messaging facade options", disable_help_flag = true)]
pub struct AminoArgs {
    /// Дополнительный файл конфигурации (можно указать несколько раз).
    #[arg(long = "conf", value_name = "PATH")]
    pub conf: Vec<PathBuf>,

    /// Переопределение ключа конфигурации: `--set queue.driver=memory`.
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub set: Vec<(String, String)>,

    #[arg(long)]
    pub debug: bool,

    #[arg(long, value_name = "DRIVER")]
    pub pubsub_driver: Option<String>,

    #[arg(long, value_name = "DRIVER")]
    pub queue_driver: Option<String>,

    #[arg(long, value_name = "DRIVER")]
    pub request_driver: Option<String>,
}

impl AminoArgs {
    /// Разбирает аргументы. Первый элемент считается именем программы.
    pub fn parse_args<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Self::try_parse_from(args)
    }

    /// Переопределения ключей в порядке применения.
    pub fn overrides(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        if self.debug {
            out.push(("debug".to_string(), "true".to_string()));
        }
        let drivers = [
            ("pubsub.driver", &self.pubsub_driver),
            ("queue.driver", &self.queue_driver),
            ("request.driver", &self.request_driver),
        ];
        for (key, driver) in drivers {
            if let Some(driver) = driver {
                out.push((key.to_string(), driver.clone()));
            }
        }
        out.extend(self.set.iter().cloned());
        out
    }
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{s}'"));
    }
    Ok((key.to_string(), value.to_string()))
}
