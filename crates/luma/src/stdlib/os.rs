// OS library: clock and calendar pieces, environment access.

use super::{check_str, opt_int};
use crate::lib_module;
use crate::runtime::{Control, ErrorKind, Runtime};
use crate::value::{NativeCall, Value};
use chrono::{DateTime, Datelike, Local, TimeZone, Timelike, Utc};

pub fn register(rt: &Runtime) {
    lib_module!("os", {
        "clock" => os_clock,
        "time" => os_time,
        "date" => os_date,
        "getenv" => os_getenv,
    })
    .install(rt);
}

fn os_clock(rt: &Runtime, _call: &NativeCall) -> Result<Vec<Value>, Control> {
    Ok(vec![Value::Float(rt.clock())])
}

fn os_time(rt: &Runtime, call: &NativeCall) -> Result<Vec<Value>, Control> {
    match call.arg(0) {
        Value::Nil => Ok(vec![Value::Int(Utc::now().timestamp())]),
        Value::Table(tid) => {
            let field = |name: &str, default: Option<i64>| -> Result<i64, Control> {
                let v = rt.raw_get_field(tid, name);
                match v.as_integer() {
                    Some(i) => Ok(i),
                    None => default.ok_or_else(|| {
                        rt.error_here(
                            ErrorKind::TypeError,
                            format!("field '{}' missing in date table", name),
                        )
                    }),
                }
            };
            let year = field("year", None)?;
            let month = field("month", None)?;
            let day = field("day", None)?;
            let hour = field("hour", Some(12))?;
            let min = field("min", Some(0))?;
            let sec = field("sec", Some(0))?;
            let stamp = Local
                .with_ymd_and_hms(
                    year as i32,
                    month as u32,
                    day as u32,
                    hour as u32,
                    min as u32,
                    sec as u32,
                )
                .single()
                .map(|dt| dt.timestamp());
            match stamp {
                Some(t) => Ok(vec![Value::Int(t)]),
                None => Ok(vec![Value::Nil]),
            }
        }
        other => Err(super::arg_error(rt, 0, "time", "table", other)),
    }
}

fn os_date(rt: &Runtime, call: &NativeCall) -> Result<Vec<Value>, Control> {
    let format = if call.arg(0).is_nil() {
        "%c".to_string()
    } else {
        String::from_utf8_lossy(&check_str(rt, call, 0, "date")?).into_owned()
    };
    let when = opt_int(rt, call, 1, "date", Utc::now().timestamp())?;

    let (spec, utc) = match format.strip_prefix('!') {
        Some(rest) => (rest.to_string(), true),
        None => (format, false),
    };

    if spec == "*t" {
        fn components<Tz: TimeZone>(dt: DateTime<Tz>) -> [(&'static str, Value); 9] {
            [
                ("year", Value::Int(dt.year() as i64)),
                ("month", Value::Int(dt.month() as i64)),
                ("day", Value::Int(dt.day() as i64)),
                ("hour", Value::Int(dt.hour() as i64)),
                ("min", Value::Int(dt.minute() as i64)),
                ("sec", Value::Int(dt.second() as i64)),
                ("wday", Value::Int(dt.weekday().number_from_sunday() as i64)),
                ("yday", Value::Int(dt.ordinal() as i64)),
                ("isdst", Value::Bool(false)),
            ]
        }
        let fields = if utc {
            components(Utc.timestamp_opt(when, 0).single().unwrap_or_else(Utc::now))
        } else {
            components(
                Local
                    .timestamp_opt(when, 0)
                    .single()
                    .unwrap_or_else(Local::now),
            )
        };
        let t = rt.new_table();
        for (name, v) in fields {
            rt.raw_set_field(t, name, v);
        }
        return Ok(vec![Value::Table(t)]);
    }

    let rendered = if utc {
        Utc.timestamp_opt(when, 0)
            .single()
            .unwrap_or_else(Utc::now)
            .format(&spec)
            .to_string()
    } else {
        Local
            .timestamp_opt(when, 0)
            .single()
            .unwrap_or_else(Local::now)
            .format(&spec)
            .to_string()
    };
    Ok(vec![rt.str_value(&rendered)])
}

fn os_getenv(rt: &Runtime, call: &NativeCall) -> Result<Vec<Value>, Control> {
    let name = String::from_utf8_lossy(&check_str(rt, call, 0, "getenv")?).into_owned();
    Ok(vec![match std::env::var(&name) {
        Ok(v) => rt.str_value(&v),
        Err(_) => Value::Nil,
    }])
}
