// 金额换算 - 全程十进制字符串，不经过浮点 / Amount conversion - decimal strings throughout, no floats
use anyhow::{anyhow, Result};

/// 原生单位转UI字符串，按精度插入小数点并去掉尾零
/// Native units to UI string, inserts the decimal point and strips trailing zeros
pub fn native_to_ui(native: u64, decimals: u8) -> String {
    if decimals == 0 {
        return native.to_string();
    }
    let s = format!("{:0>width$}", native, width = decimals as usize + 1);
    let split = s.len() - decimals as usize;
    let (int_part, frac_part) = s.split_at(split);
    let frac_part = frac_part.trim_end_matches('0');
    if frac_part.is_empty() {
        int_part.to_string()
    } else {
        format!("{}.{}", int_part, frac_part)
    }
}

/// UI字符串转原生单位，小数位超过精度视为错误
/// UI string to native units, more fractional digits than the precision is an error
pub fn ui_to_native(ui: &str, decimals: u8) -> Result<u64> {
    let ui = ui.trim();
    if ui.is_empty() {
        return Err(anyhow!("empty amount"));
    }
    let (int_part, frac_part) = match ui.split_once('.') {
        Some((i, f)) => (i, f),
        None => (ui, ""),
    };
    if int_part.chars().any(|c| !c.is_ascii_digit())
        || frac_part.chars().any(|c| !c.is_ascii_digit())
        || (int_part.is_empty() && frac_part.is_empty())
    {
        return Err(anyhow!("invalid amount: {}", ui));
    }
    if frac_part.len() > decimals as usize {
        return Err(anyhow!(
            "amount {} has more than {} decimal places",
            ui,
            decimals
        ));
    }
    let mut digits = String::with_capacity(int_part.len() + decimals as usize);
    digits.push_str(int_part);
    digits.push_str(frac_part);
    for _ in frac_part.len()..decimals as usize {
        digits.push('0');
    }
    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Ok(0);
    }
    digits
        .parse::<u64>()
        .map_err(|_| anyhow!("amount {} overflows u64 native units", ui))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_to_ui() {
        assert_eq!(native_to_ui(1_500_000, 6), "1.5");
        assert_eq!(native_to_ui(1_000_000, 6), "1");
        assert_eq!(native_to_ui(1, 6), "0.000001");
        assert_eq!(native_to_ui(0, 6), "0");
        assert_eq!(native_to_ui(42, 0), "42");
    }

    #[test]
    fn test_ui_to_native() {
        assert_eq!(ui_to_native("1.5", 6).unwrap(), 1_500_000);
        assert_eq!(ui_to_native("0.000001", 6).unwrap(), 1);
        assert_eq!(ui_to_native("42", 0).unwrap(), 42);
        assert_eq!(ui_to_native("0", 6).unwrap(), 0);
        assert_eq!(ui_to_native("000.100", 6).unwrap(), 100_000);
    }

    #[test]
    fn test_ui_to_native_rejects_bad_input() {
        assert!(ui_to_native("1.2345678", 6).is_err());
        assert!(ui_to_native("abc", 6).is_err());
        assert!(ui_to_native("", 6).is_err());
        assert!(ui_to_native("-1", 6).is_err());
        assert!(ui_to_native(".", 6).is_err());
    }

    #[test]
    fn test_round_trip_exactness() {
        for native in [0u64, 1, 999_999, 1_000_001, u64::MAX / 2] {
            let ui = native_to_ui(native, 9);
            assert_eq!(ui_to_native(&ui, 9).unwrap(), native);
        }
    }
}
