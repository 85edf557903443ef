use crate::error::{Result, SchedulerError};
use crate::types::Room;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Split one CSV line, honoring double-quoted fields ("" escapes a quote).
/// Building addresses contain commas, so naive splitting is not enough.
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                fields.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    fields.push(current.trim().to_string());
    fields
}

/// Load the rooms table from a CSV file with columns
/// `name,capacity,address,is_special`
pub fn load_rooms_csv(path: &Path) -> Result<Vec<Room>> {
    let path_str = path.display().to_string();
    let content = fs::read_to_string(path).map_err(|e| SchedulerError::FileRead {
        path: path_str.clone(),
        source: e,
    })?;

    let mut lines = content.lines().enumerate();
    let header = loop {
        match lines.next() {
            Some((_, line)) if line.trim().is_empty() => continue,
            Some((_, line)) => break split_csv_line(line),
            None => return Err(SchedulerError::NoRooms.into()),
        }
    };

    let column = |name: &str| header.iter().position(|h| h.eq_ignore_ascii_case(name));
    let name_col = column("name").ok_or_else(|| SchedulerError::RoomsParse {
        file: path_str.clone(),
        line: 1,
        message: "missing 'name' column".to_string(),
    })?;
    let capacity_col = column("capacity").ok_or_else(|| SchedulerError::RoomsParse {
        file: path_str.clone(),
        line: 1,
        message: "missing 'capacity' column".to_string(),
    })?;
    let address_col = column("address").ok_or_else(|| SchedulerError::RoomsParse {
        file: path_str.clone(),
        line: 1,
        message: "missing 'address' column".to_string(),
    })?;
    let special_col = column("is_special");

    let mut rooms = Vec::new();
    for (line_no, line) in lines {
        if line.trim().is_empty() {
            continue;
        }
        let fields = split_csv_line(line);
        let field = |col: usize| fields.get(col).map(|s| s.as_str()).unwrap_or("");

        let name = field(name_col).to_string();
        if name.is_empty() {
            continue;
        }
        let capacity_str = field(capacity_col);
        let capacity = if capacity_str.is_empty() {
            0
        } else {
            capacity_str
                .parse::<u32>()
                .map_err(|e| SchedulerError::RoomsParse {
                    file: path_str.clone(),
                    line: line_no + 1,
                    message: format!("bad capacity '{capacity_str}': {e}"),
                })?
        };
        let is_special = special_col
            .map(|col| field(col).eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        rooms.push(Room {
            name,
            capacity,
            address: field(address_col).to_string(),
            is_special,
        });
    }

    if rooms.is_empty() {
        return Err(SchedulerError::NoRooms.into());
    }
    Ok(rooms)
}

/// Load a one-column CSV of base group names (forced second shift, dead
/// groups). Accepts either a `name` or a `group` header.
pub fn load_group_list_csv(path: &Path) -> Result<HashSet<String>> {
    let path_str = path.display().to_string();
    let content = fs::read_to_string(path).map_err(|e| SchedulerError::FileRead {
        path: path_str,
        source: e,
    })?;

    let mut out = HashSet::new();
    let mut lines = content.lines();
    let Some(header) = lines.next() else {
        return Ok(out);
    };
    let header_fields = split_csv_line(header);
    let column = header_fields
        .iter()
        .position(|h| h.eq_ignore_ascii_case("name") || h.eq_ignore_ascii_case("group"))
        .unwrap_or(0);

    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        let fields = split_csv_line(line);
        if let Some(value) = fields.get(column) {
            if !value.is_empty() {
                out.insert(value.clone());
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_plain_line() {
        assert_eq!(split_csv_line("a,b,c"), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_split_quoted_address() {
        assert_eq!(
            split_csv_line(r#"112,"ул. Жангир хана, 51/4",30"#),
            vec!["112", "ул. Жангир хана, 51/4", "30"]
        );
    }

    #[test]
    fn test_split_escaped_quote() {
        assert_eq!(split_csv_line(r#""say ""hi""",x"#), vec![r#"say "hi""#, "x"]);
    }

    #[test]
    fn test_load_rooms_round_trip() {
        let dir = std::env::temp_dir().join("course-scheduler-rooms-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("rooms.csv");
        std::fs::write(
            &path,
            "name,capacity,address,is_special\n\
             101,30,\"ул. Чапаева 69\",false\n\
             Спорт зал,120,\"ул. Чапаева 69\",true\n",
        )
        .unwrap();

        let rooms = load_rooms_csv(&path).unwrap();
        assert_eq!(rooms.len(), 2);
        assert_eq!(rooms[0].name, "101");
        assert_eq!(rooms[0].capacity, 30);
        assert_eq!(rooms[0].address, "ул. Чапаева 69");
        assert!(!rooms[0].is_special);
        assert!(rooms[1].is_special);
    }

    #[test]
    fn test_empty_rooms_table_is_fatal() {
        let dir = std::env::temp_dir().join("course-scheduler-rooms-empty");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("rooms.csv");
        std::fs::write(&path, "name,capacity,address,is_special\n").unwrap();
        assert!(load_rooms_csv(&path).is_err());
    }
}
