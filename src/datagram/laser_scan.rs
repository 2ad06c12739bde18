use std::f64::consts::PI;

use anyhow::anyhow;
use bytes::{Buf, BufMut};

use crate::datagram::decode_error::{DecodeError, Violations};
use crate::util::buf_ext::BufExt;


const RANGE_LIMIT: f64 = 1e4;
const DURATION_LIMIT: f64 = 1e12;
const MAX_NUM_BEAMS: u32 = 100_000;

/// A single laser scan as published on the Locator's binary laser output port.
///
/// The two arrays are length-prefixed on the wire, and those prefixes are authoritative:
///  `num_beams` is the nominal beam count of the scanner and is not used for framing.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LaserScanDatagram {
    pub scan_num: u16,
    pub time_start: f64,
    pub unique_id: u64,
    pub duration_beam: f64,
    pub duration_scan: f64,
    pub duration_rotate: f64,
    pub num_beams: u32,
    pub angle_start: f32,
    pub angle_end: f32,
    pub angle_inc: f32,
    pub min_range: f32,
    pub max_range: f32,
    pub ranges: Vec<f32>,
    pub has_intensities: u8,
    pub min_intensity: f32,
    pub max_intensity: f32,
    pub intensities: Vec<f32>,
}

impl LaserScanDatagram {
    /// everything up to and including the range array's length prefix
    pub const HEADER_LEN: usize = 70;
    /// everything from `has_intensities` up to and including the intensity array's length prefix
    pub const TAIL_LEN: usize = 13;

    pub fn serialized_len(&self) -> usize {
        Self::HEADER_LEN + 4*self.ranges.len() + Self::TAIL_LEN + 4*self.intensities.len()
    }

    pub(crate) fn try_deser(buf: &mut impl Buf, violations: &mut Violations) -> Result<LaserScanDatagram, DecodeError> {
        buf.ensure_remaining(Self::HEADER_LEN)?;

        let scan_num = buf.try_get_u16_le()?;
        let time_start = buf.try_get_f64_le()?;
        let unique_id = buf.try_get_u64_le()?;
        let duration_beam = buf.try_get_f64_le()?;
        let duration_scan = buf.try_get_f64_le()?;
        let duration_rotate = buf.try_get_f64_le()?;
        let num_beams = buf.try_get_u32_le()?;
        let angle_start = buf.try_get_f32_le()?;
        let angle_end = buf.try_get_f32_le()?;
        let angle_inc = buf.try_get_f32_le()?;
        let min_range = buf.try_get_f32_le()?;
        let max_range = buf.try_get_f32_le()?;

        let range_array_size = buf.try_get_u32_le()?;
        let ranges = buf.try_get_f32_le_array(range_array_size as usize)?;

        buf.ensure_remaining(Self::TAIL_LEN)?;
        let has_intensities = buf.try_get_u8()?;
        let min_intensity = buf.try_get_f32_le()?;
        let max_intensity = buf.try_get_f32_le()?;

        let intensity_array_size = buf.try_get_u32_le()?;
        let intensities = buf.try_get_f32_le_array(intensity_array_size as usize)?;

        violations.check_range("time_start", time_start, 0.0..=DURATION_LIMIT);
        violations.check_range("duration_beam", duration_beam, 0.0..=DURATION_LIMIT);
        violations.check_range("duration_scan", duration_scan, 0.0..=DURATION_LIMIT);
        violations.check_range("duration_rotate", duration_rotate, 0.0..=DURATION_LIMIT);
        if num_beams > MAX_NUM_BEAMS {
            violations.push(DecodeError::FieldOutOfRange { field: "num_beams", value: num_beams.into() });
        }
        violations.check_range("angle_start", angle_start.into(), -2.0*PI..=2.0*PI);
        violations.check_range("angle_end", angle_end.into(), -2.0*PI..=2.0*PI);
        violations.check_range("angle_inc", angle_inc.into(), -2.0*PI..=2.0*PI);
        violations.check_range("min_range", min_range.into(), 0.0..=RANGE_LIMIT);
        violations.check_range("max_range", max_range.into(), 0.0..=RANGE_LIMIT);
        violations.check_all("ranges", &ranges, -RANGE_LIMIT..=RANGE_LIMIT);
        violations.check_all("intensities", &intensities, -RANGE_LIMIT..=RANGE_LIMIT);

        Ok(LaserScanDatagram {
            scan_num,
            time_start,
            unique_id,
            duration_beam,
            duration_scan,
            duration_rotate,
            num_beams,
            angle_start,
            angle_end,
            angle_inc,
            min_range,
            max_range,
            ranges,
            has_intensities,
            min_intensity,
            max_intensity,
            intensities,
        })
    }

    /// NB: array lengths are written from the vectors' actual lengths. Fails without writing
    ///  anything if an array is too long for its u32 length prefix.
    pub fn ser(&self, buf: &mut impl BufMut) -> anyhow::Result<()> {
        let range_array_size = array_size("ranges", &self.ranges)?;
        let intensity_array_size = array_size("intensities", &self.intensities)?;

        buf.put_u16_le(self.scan_num);
        buf.put_f64_le(self.time_start);
        buf.put_u64_le(self.unique_id);
        buf.put_f64_le(self.duration_beam);
        buf.put_f64_le(self.duration_scan);
        buf.put_f64_le(self.duration_rotate);
        buf.put_u32_le(self.num_beams);
        buf.put_f32_le(self.angle_start);
        buf.put_f32_le(self.angle_end);
        buf.put_f32_le(self.angle_inc);
        buf.put_f32_le(self.min_range);
        buf.put_f32_le(self.max_range);
        put_f32_array(buf, range_array_size, &self.ranges);
        buf.put_u8(self.has_intensities);
        buf.put_f32_le(self.min_intensity);
        buf.put_f32_le(self.max_intensity);
        put_f32_array(buf, intensity_array_size, &self.intensities);
        Ok(())
    }
}

fn array_size(field: &str, values: &[f32]) -> anyhow::Result<u32> {
    u32::try_from(values.len())
        .map_err(|_| anyhow!("{} has {} elements, more than a u32 length prefix can hold", field, values.len()))
}

fn put_f32_array(buf: &mut impl BufMut, len: u32, values: &[f32]) {
    buf.put_u32_le(len);
    for &v in values {
        buf.put_f32_le(v);
    }
}


#[cfg(test)]
mod test {
    use bytes::BytesMut;
    use rstest::rstest;
    use crate::test_util::datagram::test_laser_scan;
    use super::*;

    fn serialized(scan: &LaserScanDatagram) -> BytesMut {
        let mut buf = BytesMut::new();
        scan.ser(&mut buf).unwrap();
        buf
    }

    #[rstest]
    #[case::no_arrays(0, 0)]
    #[case::ranges_only(541, 0)]
    #[case::both(3, 3)]
    #[case::more_intensities(1, 5)]
    fn test_consumes_exactly_the_declared_length(#[case] num_ranges: usize, #[case] num_intensities: usize) {
        let scan = test_laser_scan(num_ranges, num_intensities);
        let mut buf = serialized(&scan);
        assert_eq!(buf.len(), LaserScanDatagram::HEADER_LEN + 4*num_ranges + LaserScanDatagram::TAIL_LEN + 4*num_intensities);
        buf.extend_from_slice(b"trailing");

        let mut remaining: &[u8] = buf.as_ref();
        let mut violations = Violations::default();
        let decoded = LaserScanDatagram::try_deser(&mut remaining, &mut violations).unwrap();

        assert_eq!(decoded, scan);
        assert_eq!(remaining, b"trailing");
        assert!(violations.into_vec().is_empty());
    }

    /// two ranges, one intensity, assembled field by field
    fn hand_built_scan() -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&513u16.to_le_bytes());
        buf.extend_from_slice(&1.5f64.to_le_bytes());
        buf.extend_from_slice(&77u64.to_le_bytes());
        for v in [0.001f64, 0.05, 0.1] { buf.extend_from_slice(&v.to_le_bytes()); }
        buf.extend_from_slice(&3u32.to_le_bytes());
        for v in [-1.0f32, 1.0, 0.5, 0.1, 20.0] { buf.extend_from_slice(&v.to_le_bytes()); }
        buf.extend_from_slice(&2u32.to_le_bytes());
        for v in [4.0f32, 5.0] { buf.extend_from_slice(&v.to_le_bytes()); }
        buf.push(1);
        for v in [0.0f32, 100.0] { buf.extend_from_slice(&v.to_le_bytes()); }
        buf.extend_from_slice(&1u32.to_le_bytes());
        buf.extend_from_slice(&7.0f32.to_le_bytes());
        buf
    }

    #[test]
    fn test_wire_layout() {
        let buf = hand_built_scan();
        assert_eq!(buf.len(), 70 + 8 + 13 + 4);

        assert_eq!(&buf[0..2], &513u16.to_le_bytes());
        assert_eq!(&buf[42..46], &3u32.to_le_bytes());
        assert_eq!(&buf[66..70], &2u32.to_le_bytes());
        assert_eq!(buf[70 + 4*2], 1);
        assert_eq!(&buf[70 + 4*2 + 9..70 + 4*2 + 13], &1u32.to_le_bytes());

        let mut remaining: &[u8] = &buf;
        let mut violations = Violations::default();
        let decoded = LaserScanDatagram::try_deser(&mut remaining, &mut violations).unwrap();
        assert!(remaining.is_empty());
        assert!(violations.into_vec().is_empty());

        assert_eq!(decoded, LaserScanDatagram {
            scan_num: 513,
            time_start: 1.5,
            unique_id: 77,
            duration_beam: 0.001,
            duration_scan: 0.05,
            duration_rotate: 0.1,
            num_beams: 3,
            angle_start: -1.0,
            angle_end: 1.0,
            angle_inc: 0.5,
            min_range: 0.1,
            max_range: 20.0,
            ranges: vec![4.0, 5.0],
            has_intensities: 1,
            min_intensity: 0.0,
            max_intensity: 100.0,
            intensities: vec![7.0],
        });

        let mut reencoded = Vec::new();
        decoded.ser(&mut reencoded).unwrap();
        assert_eq!(reencoded, buf);
    }

    #[test]
    fn test_min_len_without_arrays() {
        assert_eq!(serialized(&test_laser_scan(0, 0)).len(), 83);
    }

    #[test]
    fn test_array_length_is_taken_from_the_buffer_not_num_beams() {
        let mut scan = test_laser_scan(2, 0);
        scan.num_beams = 1000;
        let buf = serialized(&scan);

        let mut violations = Violations::default();
        let decoded = LaserScanDatagram::try_deser(&mut buf.as_ref(), &mut violations).unwrap();
        assert_eq!(decoded.ranges.len(), 2);
        assert_eq!(decoded.num_beams, 1000);
    }

    #[test]
    fn test_every_truncation_is_a_framing_error() {
        let buf = serialized(&test_laser_scan(4, 2));

        for len in 0..buf.len() {
            let mut violations = Violations::default();
            let result = LaserScanDatagram::try_deser(&mut &buf[..len], &mut violations);
            assert!(matches!(result, Err(DecodeError::Truncated { .. })), "len {}: {:?}", len, result);
        }
    }

    #[rstest]
    // 70 bytes of header declare 4 ranges (16 bytes), one byte missing
    #[case::within_ranges(70 + 15, 16, 15)]
    // ranges complete, tail complete, 2 intensities declared, one byte missing
    #[case::within_intensities(70 + 16 + 13 + 7, 8, 7)]
    fn test_truncated_within_array(#[case] len: usize, #[case] needed: usize, #[case] remaining: usize) {
        let buf = serialized(&test_laser_scan(4, 2));

        let mut violations = Violations::default();
        let result = LaserScanDatagram::try_deser(&mut &buf[..len], &mut violations);
        assert_eq!(result, Err(DecodeError::Truncated { needed, remaining }));
    }

    #[test]
    fn test_huge_declared_array_does_not_allocate() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&serialized(&test_laser_scan(0, 0))[..LaserScanDatagram::HEADER_LEN - 4]);
        buf.put_u32_le(u32::MAX);
        buf.extend_from_slice(&[0u8; 16]);

        let mut violations = Violations::default();
        let result = LaserScanDatagram::try_deser(&mut buf.as_ref(), &mut violations);
        assert!(matches!(result, Err(DecodeError::Truncated { remaining: 16, .. })));
    }

    #[test]
    fn test_range_violations_do_not_abort_decoding() {
        let mut scan = test_laser_scan(3, 2);
        scan.ranges[1] = 1.5e4;
        scan.intensities[0] = -2e4;
        let buf = serialized(&scan);

        let mut violations = Violations::default();
        let decoded = LaserScanDatagram::try_deser(&mut buf.as_ref(), &mut violations).unwrap();

        assert_eq!(decoded, scan);
        assert_eq!(violations.into_vec(), vec![
            DecodeError::FieldOutOfRange { field: "ranges", value: 1.5e4 },
            DecodeError::FieldOutOfRange { field: "intensities", value: -2e4 },
        ]);
    }

    #[rstest]
    #[case::negative_time_start(|s: &mut LaserScanDatagram| s.time_start = -1.0, "time_start")]
    #[case::num_beams(|s: &mut LaserScanDatagram| s.num_beams = 100_001, "num_beams")]
    #[case::angle_start(|s: &mut LaserScanDatagram| s.angle_start = 7.0, "angle_start")]
    #[case::angle_inc(|s: &mut LaserScanDatagram| s.angle_inc = -7.0, "angle_inc")]
    #[case::min_range(|s: &mut LaserScanDatagram| s.min_range = -0.5, "min_range")]
    #[case::max_range(|s: &mut LaserScanDatagram| s.max_range = 1e5, "max_range")]
    fn test_header_violations(#[case] modify: fn(&mut LaserScanDatagram), #[case] field: &str) {
        let mut scan = test_laser_scan(1, 0);
        modify(&mut scan);
        let buf = serialized(&scan);

        let mut violations = Violations::default();
        LaserScanDatagram::try_deser(&mut buf.as_ref(), &mut violations).unwrap();

        let violations = violations.into_vec();
        assert_eq!(violations.len(), 1);
        assert!(matches!(violations[0], DecodeError::FieldOutOfRange { field: f, .. } if f == field));
    }
}
