//! 陀螺仪录制文件 (CSV)
//!
//! 每行 `x,y,z,t_ns`：三轴角速度 + 设备时钟纳秒时间戳。
//! 任何一行不合法时整个序列被丢弃，下游估计器只会看到完整数据或空序列。

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use contracts::SignalSeries;
use metrics::counter;
use tracing::{debug, warn};

use crate::error::{IngestionError, Result};

/// 解析录制内容
///
/// IO 错误向上返回；格式错误返回空序列。
pub fn parse_signal_csv<R: BufRead>(reader: R) -> Result<SignalSeries> {
    let mut series = SignalSeries::new();

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let Some((timestamp, sample)) = parse_row(&line) else {
            warn!(line = line_no + 1, "malformed gyro row, discarding recording");
            counter!("gyro_recordings_rejected_total", "reason" => "malformed_row").increment(1);
            return Ok(SignalSeries::new());
        };
        if !series.push(timestamp, sample) {
            warn!(line = line_no + 1, "gyro timestamps go backwards, discarding recording");
            counter!("gyro_recordings_rejected_total", "reason" => "out_of_order").increment(1);
            return Ok(SignalSeries::new());
        }
    }

    debug!(rows = series.len(), "gyro recording parsed");
    Ok(series)
}

/// 从文件读取录制
pub fn read_signal_csv(path: &Path) -> Result<SignalSeries> {
    let file = File::open(path).map_err(|source| IngestionError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    parse_signal_csv(BufReader::new(file))
}

/// 将序列写为录制文件 (时间戳转换回纳秒)
pub fn write_signal_csv(path: &Path, series: &SignalSeries) -> Result<()> {
    let mut writer = GyroCsvWriter::create(path)?;
    for (timestamp, sample) in series.iter() {
        writer.write_row(sample, (timestamp * 1e9).round() as i64)?;
    }
    writer.finish()?;
    Ok(())
}

/// 单行解析：恰好 4 列且均为有限数值
fn parse_row(line: &str) -> Option<(f64, [f64; 3])> {
    let mut fields = line.split(',').map(str::trim);
    let x = parse_finite(fields.next()?)?;
    let y = parse_finite(fields.next()?)?;
    let z = parse_finite(fields.next()?)?;
    let t_ns = parse_finite(fields.next()?)?;
    if fields.next().is_some() {
        return None;
    }
    Some((t_ns / 1e9, [x, y, z]))
}

fn parse_finite(field: &str) -> Option<f64> {
    field.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// 录制文件写入器
pub struct GyroCsvWriter<W: Write> {
    inner: W,
    rows: u64,
}

impl GyroCsvWriter<BufWriter<File>> {
    /// 创建文件 (覆盖已有文件)
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).map_err(|source| IngestionError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> GyroCsvWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, rows: 0 }
    }

    pub fn write_row(&mut self, sample: [f64; 3], t_ns: i64) -> Result<()> {
        writeln!(
            self.inner,
            "{},{},{},{}",
            sample[0], sample[1], sample[2], t_ns
        )?;
        self.rows += 1;
        Ok(())
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Flush 并取回底层 writer
    pub fn finish(mut self) -> Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const THREE_ROWS: &str = "1.8405248,-1.7660676,0.49335796,691166767933511\n\
                              1.6930052,-1.6313792,0.48175088,691166772951584\n\
                              1.5433006,-1.4894918,0.46773812,691166777969657\n";

    #[test]
    fn test_parse_three_rows() {
        let series = parse_signal_csv(Cursor::new(THREE_ROWS)).unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.samples()[0], [1.8405248, -1.7660676, 0.49335796]);
        assert_eq!(series.samples()[2], [1.5433006, -1.4894918, 0.46773812]);
        assert_eq!(series.timestamps()[0], 691166767933511.0 / 1e9);
        assert_eq!(series.timestamps()[1], 691166772951584.0 / 1e9);
        assert_eq!(series.timestamps()[2], 691166777969657.0 / 1e9);
    }

    #[test]
    fn test_empty_input_yields_empty_series() {
        let series = parse_signal_csv(Cursor::new("")).unwrap();
        assert!(series.is_empty());
    }

    #[test]
    fn test_any_malformed_row_discards_everything() {
        let cases = [
            "1.0,2.0,3.0,100\n1.0,2.0,100\n1.0,2.0,3.0,300\n",
            "1.0,2.0,3.0,100\n1.0,abc,3.0,200\n",
            "1.0,2.0,3.0,100\n\n1.0,2.0,3.0,300\n",
            "1.0,2.0,3.0,100,7\n",
            "1.0,2.0,NaN,100\n",
            "1.0,2.0,3.0,100\n1.0,2.0,3.0,300\n1.0,2.0,3.0,200\n",
        ];
        for case in cases {
            let series = parse_signal_csv(Cursor::new(case)).unwrap();
            assert!(series.is_empty(), "expected discard for {case:?}");
            assert!(series.timestamps().is_empty());
        }
    }

    #[test]
    fn test_crlf_and_spaces_are_tolerated() {
        let series = parse_signal_csv(Cursor::new("1.0, 2.0 ,3.0,100\r\n4.0,5.0,6.0,200\r\n"))
            .unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.samples()[1], [4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_read_missing_file_is_error() {
        let result = read_signal_csv(Path::new("/nonexistent/gyro.csv"));
        assert!(matches!(result, Err(IngestionError::Open { .. })));
    }

    #[test]
    fn test_writer_output_parses_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gyro.csv");

        let mut writer = GyroCsvWriter::create(&path).unwrap();
        writer.write_row([0.25, -1.5, 3.0], 1_000_000_000).unwrap();
        writer.write_row([0.5, -1.0, 2.0], 1_005_000_000).unwrap();
        assert_eq!(writer.rows(), 2);
        writer.finish().unwrap();

        let series = read_signal_csv(&path).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.timestamps()[1], 1.005);
        assert_eq!(series.samples()[0], [0.25, -1.5, 3.0]);
    }
}
