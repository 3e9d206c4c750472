use nalgebra_glm as glm;

const DEFAULT_YAW: f32 = -90.0;
const DEFAULT_SPEED: f32 = 3.0;
const DEFAULT_SENSITIVITY: f32 = 0.25;
const DEFAULT_ZOOM: f32 = 45.0;

const PITCH_LIMIT: f32 = 89.0;
const ZOOM_MIN: f32 = 1.0;
const ZOOM_MAX: f32 = 45.0;

/// The directions the camera can be translated in, relative to its orientation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CameraMovement {
    Forward,
    Backward,
    Left,
    Right,
}

/// A free-fly camera. Orientation is stored as yaw/pitch in degrees, with the
/// pitch clamped to avoid flipping over the vertical axis. The front/right/up
/// vectors are recomputed whenever the orientation changes.
pub struct Camera {
    position: glm::Vec3,
    front: glm::Vec3,
    up: glm::Vec3,
    right: glm::Vec3,
    world_up: glm::Vec3,

    yaw: f32,
    pitch: f32,

    movement_speed: f32,
    mouse_sensitivity: f32,
    zoom: f32,
}

impl Camera {
    pub fn new(position: glm::Vec3) -> Self {
        let mut camera = Self {
            position,
            front: glm::vec3(0.0, 0.0, -1.0),
            up: glm::vec3(0.0, 1.0, 0.0),
            right: glm::vec3(1.0, 0.0, 0.0),
            world_up: glm::vec3(0.0, 1.0, 0.0),
            yaw: DEFAULT_YAW,
            pitch: 0.0,
            movement_speed: DEFAULT_SPEED,
            mouse_sensitivity: DEFAULT_SENSITIVITY,
            zoom: DEFAULT_ZOOM,
        };

        camera.update_vectors();
        camera
    }

    pub fn position(&self) -> glm::Vec3 {
        self.position
    }

    pub fn front(&self) -> glm::Vec3 {
        self.front
    }

    /// The vertical field of view, in degrees.
    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    /// The view matrix looking from the camera position along its front vector.
    pub fn view_matrix(&self) -> glm::Mat4 {
        glm::look_at(&self.position, &(self.position + self.front), &self.up)
    }

    /// Translate the camera in the given direction, scaled by the movement speed
    /// and the frame's delta time (in seconds).
    pub fn process_keyboard(&mut self, direction: CameraMovement, delta_time: f32) {
        let velocity = self.movement_speed * delta_time;

        match direction {
            CameraMovement::Forward => self.position += self.front * velocity,
            CameraMovement::Backward => self.position -= self.front * velocity,
            CameraMovement::Left => self.position -= self.right * velocity,
            CameraMovement::Right => self.position += self.right * velocity,
        }
    }

    /// Apply a mouse movement offset to the camera orientation. A positive
    /// `y_offset` pitches the camera upward.
    pub fn process_mouse(&mut self, x_offset: f32, y_offset: f32) {
        self.yaw += x_offset * self.mouse_sensitivity;
        self.pitch += y_offset * self.mouse_sensitivity;
        self.pitch = self.pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT);

        self.update_vectors();
    }

    /// Apply a scroll-wheel offset to the field of view.
    pub fn process_scroll(&mut self, y_offset: f32) {
        self.zoom = (self.zoom - y_offset).clamp(ZOOM_MIN, ZOOM_MAX);
    }

    fn update_vectors(&mut self) {
        let yaw = self.yaw.to_radians();
        let pitch = self.pitch.to_radians();

        self.front = glm::normalize(&glm::vec3(
            yaw.cos() * pitch.cos(),
            pitch.sin(),
            yaw.sin() * pitch.cos(),
        ));

        self.right = glm::normalize(&glm::cross(&self.front, &self.world_up));
        self.up = glm::normalize(&glm::cross(&self.right, &self.front));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    #[test]
    fn default_orientation_looks_down_negative_z() {
        let camera = Camera::new(glm::vec3(0.0, 0.0, 3.0));

        assert_relative_eq!(camera.front(), glm::vec3(0.0, 0.0, -1.0), epsilon = 1e-5);
    }

    #[test]
    fn pitch_is_clamped() {
        let mut camera = Camera::new(glm::Vec3::zeros());

        // Far more mouse movement than 89 degrees worth.
        camera.process_mouse(0.0, 10_000.0);
        assert_relative_eq!(camera.pitch, 89.0);

        camera.process_mouse(0.0, -100_000.0);
        assert_relative_eq!(camera.pitch, -89.0);

        // The front vector never becomes fully vertical.
        assert!(camera.front().y > -1.0);
    }

    #[test]
    fn zoom_is_clamped() {
        let mut camera = Camera::new(glm::Vec3::zeros());

        camera.process_scroll(100.0);
        assert_relative_eq!(camera.zoom(), 1.0);

        camera.process_scroll(-100.0);
        assert_relative_eq!(camera.zoom(), 45.0);
    }

    #[test]
    fn keyboard_movement_follows_orientation() {
        let mut camera = Camera::new(glm::Vec3::zeros());

        camera.process_keyboard(CameraMovement::Forward, 2.0);
        assert_relative_eq!(
            camera.position(),
            glm::vec3(0.0, 0.0, -2.0 * DEFAULT_SPEED),
            epsilon = 1e-5
        );

        camera.process_keyboard(CameraMovement::Right, 1.0);
        assert_relative_eq!(camera.position().x, DEFAULT_SPEED, epsilon = 1e-5);

        // Strafing doesn't change height.
        assert_relative_eq!(camera.position().y, 0.0);
    }

    #[test]
    fn yaw_rotation_turns_the_front_vector() {
        let mut camera = Camera::new(glm::Vec3::zeros());

        // Rotate 90 degrees right; the yaw goes from -90 to 0, which faces +X.
        camera.process_mouse(90.0 / DEFAULT_SENSITIVITY, 0.0);

        assert_relative_eq!(camera.front(), glm::vec3(1.0, 0.0, 0.0), epsilon = 1e-5);
    }

    #[test]
    fn view_matrix_maps_camera_position_to_origin() {
        let mut camera = Camera::new(glm::vec3(1.5, -2.0, 3.0));
        camera.process_mouse(123.0, 45.0);

        let view = camera.view_matrix();
        let position = camera.position();
        let transformed = view * glm::vec4(position.x, position.y, position.z, 1.0);

        assert_relative_eq!(transformed, glm::vec4(0.0, 0.0, 0.0, 1.0), epsilon = 1e-5);
    }
}
