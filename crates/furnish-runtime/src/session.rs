use crate::room::RoomHitTest;
use furnish_xr::{ImmersiveSession, SessionError, SessionId, SessionProvider};

/// Grants immersive sessions on the desktop, where the "environment" is the
/// simulated room. Without any trackable surface there is nothing to place
/// on, so sessions are refused.
pub struct DesktopSessionProvider {
    next_id: u64,
    has_surfaces: bool,
}

impl DesktopSessionProvider {
    pub fn new(room: &RoomHitTest) -> Self {
        Self {
            next_id: 1,
            has_surfaces: !room.is_empty(),
        }
    }
}

impl SessionProvider for DesktopSessionProvider {
    async fn request_immersive_session(&mut self) -> Result<ImmersiveSession, SessionError> {
        if !self.has_surfaces {
            return Err(SessionError::NotSupported(
                "the room has no surfaces to hit-test".into(),
            ));
        }
        let id = SessionId(self.next_id);
        self.next_id += 1;
        log::debug!("granting desktop session {id}");
        Ok(ImmersiveSession { id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::Surface;
    use glam::Vec3;

    #[test]
    fn grants_increasing_ids() {
        let room = RoomHitTest::new(vec![Surface::Plane {
            point: Vec3::ZERO,
            normal: Vec3::Y,
        }]);
        let mut provider = DesktopSessionProvider::new(&room);

        let first = pollster::block_on(provider.request_immersive_session()).unwrap();
        let second = pollster::block_on(provider.request_immersive_session()).unwrap();
        assert_eq!(first.id, SessionId(1));
        assert_eq!(second.id, SessionId(2));
    }

    #[test]
    fn empty_room_is_not_supported() {
        let mut provider = DesktopSessionProvider::new(&RoomHitTest::new(Vec::new()));
        let err = pollster::block_on(provider.request_immersive_session()).unwrap_err();
        assert!(matches!(err, SessionError::NotSupported(_)));
    }
}
