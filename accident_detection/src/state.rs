use crate::config::{LabelsConfig, Validatable};
use std::{
    fs::File,
    io::{self, BufRead},
    path::Path,
};

const MAX_CLASSES: usize = 10_000;

/// Class names indexed by the model's class id.
#[derive(Debug, Clone, Default)]
pub struct ClassLabels {
    labels: Vec<String>,
}

impl ClassLabels {
    pub fn new(labels: Vec<String>) -> Self {
        Self { labels }
    }

    pub fn load(labels_cfg: &LabelsConfig) -> Result<Self, String> {
        match load_labels(&labels_cfg.get_path()) {
            Ok(labels) => Ok(Self::new(labels)),
            Err(e) => Err(format!("Failed to load labels: {}", e)),
        }
    }

    /// Parses the `names` entry exported models carry in their metadata,
    /// a dict literal such as `{0: 'person', 1: 'bicycle'}`. Ids missing from
    /// the dict get the generic `class_<id>` name.
    pub fn from_model_names(names: &str) -> Option<Self> {
        let entries = parse_names_dict(names)?;
        let size = entries.iter().map(|(id, _)| id + 1).max()?;
        if size > MAX_CLASSES {
            return None;
        }

        let mut labels: Vec<String> = (0..size).map(|id| format!("class_{}", id)).collect();
        for (id, name) in entries {
            labels[id] = name;
        }

        Some(Self::new(labels))
    }

    pub fn name(&self, class_id: usize) -> String {
        self.labels
            .get(class_id)
            .cloned()
            .unwrap_or_else(|| format!("class_{}", class_id))
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }
}

fn parse_names_dict(input: &str) -> Option<Vec<(usize, String)>> {
    let body = input.trim().strip_prefix('{')?.strip_suffix('}')?;
    let mut chars = body.chars().peekable();
    let mut entries = Vec::new();

    loop {
        while chars.next_if(|c| c.is_whitespace() || *c == ',').is_some() {}
        if chars.peek().is_none() {
            break;
        }

        let mut id = String::new();
        while let Some(digit) = chars.next_if(|c| c.is_ascii_digit()) {
            id.push(digit);
        }
        let id: usize = id.parse().ok()?;

        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        chars.next().filter(|c| *c == ':')?;
        while chars.next_if(|c| c.is_whitespace()).is_some() {}

        let quote = chars.next().filter(|c| *c == '\'' || *c == '"')?;
        let mut name = String::new();
        loop {
            match chars.next()? {
                '\\' => name.push(chars.next()?),
                c if c == quote => break,
                c => name.push(c),
            }
        }
        entries.push((id, name));
    }

    Some(entries)
}

/// Reads one class name per line. Lines in the `label,r,g,b` format keep
/// only the label.
pub fn load_labels(filepath: &Path) -> io::Result<Vec<String>> {
    let file = File::open(filepath)?;
    let reader = io::BufReader::new(file);
    let mut labels = Vec::new();

    for line_result in reader.lines() {
        let line = line_result?;
        let label = line.split(',').next().unwrap_or_default().trim();
        if label.is_empty() {
            continue;
        }
        labels.push(label.to_string());
    }

    Ok(labels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_labels_plain_and_csv() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "accident").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "car, 255, 0, 0").unwrap();
        writeln!(file, "  pedestrian  ").unwrap();

        let labels = load_labels(file.path()).unwrap();

        assert_eq!(labels, vec!["accident", "car", "pedestrian"]);
    }

    #[test]
    fn test_unknown_class_id_gets_generic_name() {
        let labels = ClassLabels::new(vec!["crash".to_string()]);

        assert_eq!(labels.name(0), "crash");
        assert_eq!(labels.name(3), "class_3");
    }

    #[test]
    fn test_names_from_model_metadata() {
        let labels = ClassLabels::from_model_names(
            "{0: 'person', 1: 'bicycle', 2: 'car', 3: \"driver's car\"}",
        )
        .unwrap();

        assert_eq!(labels.len(), 4);
        assert_eq!(labels.name(0), "person");
        assert_eq!(labels.name(2), "car");
        assert_eq!(labels.name(3), "driver's car");
    }

    #[test]
    fn test_model_names_with_gaps_and_bad_input() {
        let labels = ClassLabels::from_model_names("{0: 'crash', 2: 'severe'}").unwrap();

        assert_eq!(labels.name(1), "class_1");
        assert_eq!(labels.name(2), "severe");
        assert!(ClassLabels::from_model_names("{}").is_none());
        assert!(ClassLabels::from_model_names("person,car").is_none());
        assert!(ClassLabels::from_model_names("{0: 'unterminated}").is_none());
    }

    #[test]
    fn test_load_missing_file_fails() {
        let cfg = LabelsConfig {
            labels_dir: "./does_not_exist".into(),
            labels_file: "labels.txt".to_string(),
        };

        assert!(ClassLabels::load(&cfg).is_err());
    }
}
