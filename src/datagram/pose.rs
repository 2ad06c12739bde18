use bytes::{Buf, BufMut};

use crate::datagram::decode_error::{DecodeError, Violations};
use crate::datagram::mode_state::ModeState;
use crate::util::buf_ext::BufExt;


#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose2d {
    pub x: f64,
    pub y: f64,
    pub yaw: f64,
}
impl Pose2d {
    fn try_deser(buf: &mut impl Buf) -> Result<Pose2d, DecodeError> {
        Ok(Pose2d {
            x: buf.try_get_f64_le()?,
            y: buf.try_get_f64_le()?,
            yaw: buf.try_get_f64_le()?,
        })
    }

    fn ser(&self, buf: &mut impl BufMut) {
        buf.put_f64_le(self.x);
        buf.put_f64_le(self.y);
        buf.put_f64_le(self.yaw);
    }
}

/// Upper triangle of the symmetric covariance matrix over (x, y, yaw), row by row
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PoseCovariance {
    pub c_1_1: f64,
    pub c_1_2: f64,
    pub c_1_3: f64,
    pub c_2_2: f64,
    pub c_2_3: f64,
    pub c_3_3: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Quaternion {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// The localization pose as published on the Locator's binary pose port. Fixed length, packed,
///  little endian.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PoseDatagram {
    pub age: f64,
    /// seconds since epoch
    pub timestamp: f64,
    pub unique_id: u64,
    /// raw value, see [PoseDatagram::state]
    pub state: i32,
    pub error_flags: u64,
    pub info_flags: u64,
    pub pose: Pose2d,
    pub covariance: PoseCovariance,
    pub pose_z: f64,
    pub orientation: Quaternion,
    pub epoch: u64,
    pub lidar_odo_pose: Pose2d,
}

impl PoseDatagram {
    pub const SERIALIZED_LEN: usize = 188;

    pub fn state(&self) -> Result<ModeState, DecodeError> {
        ModeState::try_from_raw("state", self.state.into())
    }

    pub(crate) fn try_deser(buf: &mut impl Buf, violations: &mut Violations) -> Result<PoseDatagram, DecodeError> {
        // the record is fixed length, so a short buffer is rejected before reading any field
        buf.ensure_remaining(Self::SERIALIZED_LEN)?;

        let result = PoseDatagram {
            age: buf.try_get_f64_le()?,
            timestamp: buf.try_get_f64_le()?,
            unique_id: buf.try_get_u64_le()?,
            state: buf.try_get_i32_le()?,
            error_flags: buf.try_get_u64_le()?,
            info_flags: buf.try_get_u64_le()?,
            pose: Pose2d::try_deser(buf)?,
            covariance: PoseCovariance {
                c_1_1: buf.try_get_f64_le()?,
                c_1_2: buf.try_get_f64_le()?,
                c_1_3: buf.try_get_f64_le()?,
                c_2_2: buf.try_get_f64_le()?,
                c_2_3: buf.try_get_f64_le()?,
                c_3_3: buf.try_get_f64_le()?,
            },
            pose_z: buf.try_get_f64_le()?,
            orientation: Quaternion {
                w: buf.try_get_f64_le()?,
                x: buf.try_get_f64_le()?,
                y: buf.try_get_f64_le()?,
                z: buf.try_get_f64_le()?,
            },
            epoch: buf.try_get_u64_le()?,
            lidar_odo_pose: Pose2d::try_deser(buf)?,
        };

        if let Err(e) = result.state() {
            violations.push(e);
        }
        Ok(result)
    }

    pub fn ser(&self, buf: &mut impl BufMut) {
        buf.put_f64_le(self.age);
        buf.put_f64_le(self.timestamp);
        buf.put_u64_le(self.unique_id);
        buf.put_i32_le(self.state);
        buf.put_u64_le(self.error_flags);
        buf.put_u64_le(self.info_flags);
        self.pose.ser(buf);
        buf.put_f64_le(self.covariance.c_1_1);
        buf.put_f64_le(self.covariance.c_1_2);
        buf.put_f64_le(self.covariance.c_1_3);
        buf.put_f64_le(self.covariance.c_2_2);
        buf.put_f64_le(self.covariance.c_2_3);
        buf.put_f64_le(self.covariance.c_3_3);
        buf.put_f64_le(self.pose_z);
        buf.put_f64_le(self.orientation.w);
        buf.put_f64_le(self.orientation.x);
        buf.put_f64_le(self.orientation.y);
        buf.put_f64_le(self.orientation.z);
        buf.put_u64_le(self.epoch);
        self.lidar_odo_pose.ser(buf);
    }
}
