use bytes::BytesMut;

use crate::datagram::laser_scan::LaserScanDatagram;
use crate::datagram::pose::{Pose2d, PoseCovariance, PoseDatagram, Quaternion};


/// a pose with distinct, valid values in every field
pub fn test_pose() -> PoseDatagram {
    PoseDatagram {
        age: 0.015,
        timestamp: 1_700_000_000.25,
        unique_id: 0x0102_0304_0506_0708,
        state: 2,
        error_flags: 0,
        info_flags: 0x10,
        pose: Pose2d { x: 12.5, y: -3.75, yaw: 1.5 },
        covariance: PoseCovariance {
            c_1_1: 0.01,
            c_1_2: 0.001,
            c_1_3: 0.002,
            c_2_2: 0.02,
            c_2_3: 0.003,
            c_3_3: 0.005,
        },
        pose_z: 0.0,
        orientation: Quaternion { w: 0.75, x: 0.0, y: 0.0, z: 0.66 },
        epoch: 7,
        lidar_odo_pose: Pose2d { x: 12.25, y: -3.5, yaw: 0.25 },
    }
}

/// a valid laser scan with the given array lengths
pub fn test_laser_scan(num_ranges: usize, num_intensities: usize) -> LaserScanDatagram {
    LaserScanDatagram {
        scan_num: 513,
        time_start: 1_700_000_000.5,
        unique_id: 99,
        duration_beam: 0.0001,
        duration_scan: 0.05,
        duration_rotate: 0.0667,
        num_beams: num_ranges as u32,
        angle_start: -2.35,
        angle_end: 2.35,
        angle_inc: 0.0087,
        min_range: 0.05,
        max_range: 30.0,
        ranges: (0..num_ranges).map(|i| 1.0 + i as f32 * 0.5).collect(),
        has_intensities: (num_intensities > 0) as u8,
        min_intensity: 0.0,
        max_intensity: 255.0,
        intensities: (0..num_intensities).map(|i| i as f32).collect(),
    }
}

pub fn test_pose_bytes() -> BytesMut {
    let mut buf = BytesMut::new();
    test_pose().ser(&mut buf);
    buf
}
